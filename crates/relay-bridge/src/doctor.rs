use crate::config::{Configuration, TokenSource};
use crate::store::{Store, threads};

fn set_or_not<T>(value: &Option<T>) -> &'static str {
    if value.is_some() { "set" } else { "not set" }
}

pub fn run() -> anyhow::Result<()> {
    let config = Configuration::create()?;

    println!("Chat relay doctor\n");
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    println!("  Data Dir: {}", config.data_dir.display());
    println!("  Settings File: {}", config.settings_file.display());
    println!("  Database: {}", config.db_path.display());
    println!("  Ingress: http://{}:{}", config.listen_host, config.listen_port);
    println!(
        "  Ingress Token: {}",
        match config.ingress_token_source {
            TokenSource::Env => "from RELAY_INGRESS_TOKEN",
            TokenSource::File => "from settings file",
            TokenSource::Generated => "newly generated",
        }
    );
    println!("  Bot Token: {}", set_or_not(&config.telegram_bot_token));
    println!(
        "  Chat ID: {}",
        config
            .telegram_chat_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "not set".into())
    );
    println!(
        "  Default Thread: {}",
        config.default_thread_id.as_deref().unwrap_or("not set")
    );
    println!("  Poll Interval: {} ms", config.poll_interval_ms);

    let missing = config.missing_required();
    if missing.is_empty() {
        println!("\n  Telegram: ready");
    } else {
        println!("\n  Telegram: disabled, missing {}", missing.join(", "));
    }

    let db_path = config.db_path.to_string_lossy().to_string();
    match Store::new(&db_path) {
        Ok(store) => {
            let count = threads::list_threads(&store.conn(), 100_000).len();
            println!("  Store: ok ({count} threads)");
        }
        Err(e) => println!("  Store: error: {e:#}"),
    }

    Ok(())
}
