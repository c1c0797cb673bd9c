use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "Relay assistant threads to a Telegram chat",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge: Telegram polling plus the host ingress (default)
    Run,

    /// Show diagnostics information
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Doctor) => relay_bridge::doctor::run(),
        Some(Commands::Run) | None => relay_bridge::run_bridge().await,
    }
}
