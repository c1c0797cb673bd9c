pub mod config;
pub mod doctor;
pub mod host;
pub mod store;
pub mod telegram;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use config::Configuration;
use host::events::HostEvents;
use host::notifier::LogNotifier;
use host::store_host::{StoreHost, StoreKv};
use host::{HostChat, KeyValueStore, Notifier, Severity};
use store::Store;
use telegram::api::TelegramApi;
use telegram::dispatcher::OutboundDispatcher;
use telegram::navigation::ConfigFlags;
use telegram::replies::ReplyForwarder;
use telegram::session_loop::{LONG_POLL_TIMEOUT_SECS, LoopOptions, RelayBot};
use web::AppState;

/// Scope of the bridge's keys in the kv table.
const KV_SCOPE: &str = "telegram";

fn config_flags(config: &Configuration) -> ConfigFlags {
    ConfigFlags {
        has_bot_token: config.telegram_bot_token.is_some(),
        has_chat_id: config.telegram_chat_id.is_some(),
        has_default_thread: config.default_thread_id.is_some(),
        poll_interval_ms: config.poll_interval_ms,
    }
}

/// Telegram side of the bridge: the poll loop plus the reply forwarder.
struct TelegramSide {
    bot: RelayBot,
    forwarder: tokio::task::JoinHandle<()>,
}

fn start_telegram(
    config: &Configuration,
    host: Arc<dyn HostChat>,
    kv: Arc<dyn KeyValueStore>,
    events: &HostEvents,
    notifier: &dyn Notifier,
) -> Option<TelegramSide> {
    let Some(target) = config.telegram_target() else {
        notifier.notify(
            &format!(
                "Telegram bridge disabled: missing {}",
                config.missing_required().join(", ")
            ),
            Severity::Warning,
            None,
        );
        return None;
    };

    let dispatcher = Arc::new(OutboundDispatcher::new(
        Arc::new(TelegramApi::new(&target.bot_token)),
        target.chat_id,
    ));

    let forwarder = Arc::new(ReplyForwarder::new(dispatcher.clone(), host.clone()))
        .start(events);

    let bot = RelayBot::new(
        dispatcher,
        host,
        kv,
        LoopOptions {
            chat_id: target.chat_id,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            long_poll_timeout_secs: LONG_POLL_TIMEOUT_SECS,
            default_thread_id: config.default_thread_id.clone(),
            flags: config_flags(config),
        },
    );
    bot.start();

    Some(TelegramSide { bot, forwarder })
}

pub async fn run_bridge() -> anyhow::Result<()> {
    // Load configuration
    let config = Configuration::create()?;

    info!(
        port = config.listen_port,
        host = %config.listen_host,
        data_dir = %config.data_dir.display(),
        telegram = config.telegram_target().is_some(),
        "starting chat relay"
    );

    // Create store
    let db_path_str = config.db_path.to_string_lossy().to_string();
    let store = Arc::new(Store::new(&db_path_str)?);

    let store_host = Arc::new(StoreHost::new(store.clone()));
    let kv: Arc<dyn KeyValueStore> = Arc::new(StoreKv::new(store.clone(), KV_SCOPE));
    let events = HostEvents::new();
    let notifier = LogNotifier;

    if config.ingress_token_is_new {
        info!(token = %config.ingress_token, "generated new ingress token");
    }

    // Bind before polling so a port clash aborts early.
    let addr = format!("{}:{}", config.listen_host, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "ingress listening");

    let telegram = start_telegram(&config, store_host.clone(), kv, &events, &notifier);

    let app = web::build_router(AppState {
        ingress_token: config.ingress_token.clone(),
        store,
        host: store_host,
        events,
    });

    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let shutdown_notify_srv = shutdown_notify.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_notify_srv.notified().await;
            })
            .await
    });

    // Wait for OS signal
    shutdown_signal().await;

    if let Some(TelegramSide { bot, forwarder }) = telegram {
        bot.stop().await;
        forwarder.abort();
    }

    shutdown_notify.notify_one();
    if tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .is_err()
    {
        info!("graceful shutdown timed out, forcing exit");
    }

    info!("chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
