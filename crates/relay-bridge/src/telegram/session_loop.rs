use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::host::{HostChat, KeyValueStore};

use super::action::Action;
use super::api::{BotCommand, CallbackQuery, Message, Update};
use super::dispatcher::OutboundDispatcher;
use super::navigation::{self, ConfigFlags, NavContext, SELECTED_THREAD_KEY, SessionState};
use super::views;

/// Server-side wait of one `getUpdates` long poll.
pub const LONG_POLL_TIMEOUT_SECS: u32 = 25;

pub struct LoopOptions {
    /// The only chat the bridge talks to.
    pub chat_id: i64,
    /// Pause between poll cycles.
    pub poll_interval: Duration,
    pub long_poll_timeout_secs: u32,
    /// Selection used when nothing was persisted.
    pub default_thread_id: Option<String>,
    pub flags: ConfigFlags,
}

/// Highest update id seen so far.
pub fn advance_cursor(cursor: i64, update_id: i64) -> i64 {
    cursor.max(update_id)
}

/// `getUpdates` offset for a cursor; none before the first update.
pub fn next_offset(cursor: i64) -> Option<i64> {
    (cursor > 0).then_some(cursor + 1)
}

/// Command name of a `/command@bot args` message, without slash or bot
/// suffix. `None` for ordinary text.
fn parse_command(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    let token = rest.split_whitespace().next().unwrap_or_default();
    Some(token.split('@').next().unwrap_or_default())
}

fn bot_commands() -> Vec<BotCommand> {
    [
        ("start", "Open the main menu"),
        ("menu", "Show the main menu"),
        ("ping", "Check that the bridge is alive"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand {
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}

struct PollTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Long-polling Telegram bot that drives the navigation screens.
///
/// At most one poll task runs at a time; `start` and `stop` are idempotent.
pub struct RelayBot {
    dispatcher: Arc<OutboundDispatcher>,
    host: Arc<dyn HostChat>,
    kv: Arc<dyn KeyValueStore>,
    options: Arc<LoopOptions>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<PollTask>>,
}

impl RelayBot {
    pub fn new(
        dispatcher: Arc<OutboundDispatcher>,
        host: Arc<dyn HostChat>,
        kv: Arc<dyn KeyValueStore>,
        options: LoopOptions,
    ) -> Self {
        Self {
            dispatcher,
            host,
            kv,
            options: Arc::new(options),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the long-polling loop in a background task.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            debug!("Telegram session loop already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        info!(chat_id = self.options.chat_id, "starting Telegram session loop");

        let (stop_tx, stop_rx) = watch::channel(false);
        let poller = Poller {
            dispatcher: self.dispatcher.clone(),
            host: self.host.clone(),
            kv: self.kv.clone(),
            options: self.options.clone(),
            running: self.running.clone(),
            state: SessionState::default(),
            menu_message_id: None,
        };
        let handle = tokio::spawn(poller.run(stop_rx));
        *task = Some(PollTask { stop_tx, handle });
    }

    /// Stop polling and wait for the task to finish.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.running.store(false, Ordering::SeqCst);
        let Some(task) = task else {
            return;
        };

        let _ = task.stop_tx.send(true);
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Telegram session loop ended abnormally");
        }
    }
}

/// The poll task. Owns the session state, so no update ever sees another
/// one half-applied.
struct Poller {
    dispatcher: Arc<OutboundDispatcher>,
    host: Arc<dyn HostChat>,
    kv: Arc<dyn KeyValueStore>,
    options: Arc<LoopOptions>,
    running: Arc<AtomicBool>,
    state: SessionState,
    /// Last menu sent by `/start` or `/menu`; a new one replaces it.
    menu_message_id: Option<i64>,
}

impl Poller {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        self.prepare().await;
        self.state.polling_active = true;

        while self.running.load(Ordering::SeqCst) && !*stop_rx.borrow() {
            let offset = next_offset(self.state.update_cursor);
            let fetched = tokio::select! {
                _ = stop_rx.changed() => break,
                result = self
                    .dispatcher
                    .transport()
                    .get_updates(offset, self.options.long_poll_timeout_secs) => result,
            };
            match fetched {
                Ok(updates) => self.dispatch_batch(updates).await,
                Err(e) => warn!(error = %e, "Telegram getUpdates failed"),
            }

            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        self.state.polling_active = false;
        info!(cursor = self.state.update_cursor, "Telegram polling stopped");
    }

    async fn prepare(&mut self) {
        let transport = self.dispatcher.transport().clone();
        if let Err(e) = transport.delete_webhook().await {
            warn!(error = %e, "failed to delete Telegram webhook");
        }
        if let Err(e) = transport.set_my_commands(&bot_commands()).await {
            warn!(error = %e, "failed to register bot commands");
        }
        let selected = self.restore_selection().await;
        self.state = SessionState::new(selected);
    }

    async fn restore_selection(&self) -> Option<String> {
        match self.kv.get(SELECTED_THREAD_KEY).await {
            Ok(Some(id)) => {
                debug!(thread_id = %id, "restored thread selection");
                Some(id)
            }
            Ok(None) => self.options.default_thread_id.clone(),
            Err(e) => {
                warn!(error = %e, "failed to restore thread selection");
                self.options.default_thread_id.clone()
            }
        }
    }

    async fn dispatch_batch(&mut self, updates: Vec<Update>) {
        for update in updates {
            // Advance first: a failing handler must not cause a redelivery.
            self.state.update_cursor = advance_cursor(self.state.update_cursor, update.update_id);
            if let Some(cq) = update.callback_query {
                self.handle_callback(cq).await;
            } else if let Some(msg) = update.message {
                self.handle_message(msg).await;
            }
        }
    }

    async fn handle_callback(&mut self, cq: CallbackQuery) {
        let Some(message) = cq.message.as_ref() else {
            self.dispatcher.answer(&cq.id, None).await;
            return;
        };
        if message.chat.id != self.options.chat_id {
            debug!(chat_id = message.chat.id, from = cq.from.id, "ignoring callback from another chat");
            return;
        }
        let message_id = message.message_id;

        let action = Action::parse(cq.data.as_deref().unwrap_or_default());
        let ctx = NavContext {
            host: self.host.as_ref(),
            kv: self.kv.as_ref(),
            flags: &self.options.flags,
        };
        let outcome = navigation::apply(&mut self.state, &ctx, &action).await;

        self.dispatcher.answer(&cq.id, outcome.notice.as_deref()).await;
        if let Some(screen) = outcome.screen {
            self.dispatcher.show_screen(Some(message_id), &screen).await;
        }
    }

    async fn handle_message(&mut self, msg: Message) {
        if msg.chat.id != self.options.chat_id {
            debug!(chat_id = msg.chat.id, "ignoring message from another chat");
            return;
        }
        let Some(text) = msg.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };

        match parse_command(text) {
            Some("start" | "menu") => self.send_menu().await,
            Some("ping") => self.ping().await,
            Some(other) => {
                debug!(command = other, "unknown command");
                self.dispatcher
                    .send_new("Unknown command. Try /menu.", None, false)
                    .await;
            }
            None => self.forward_to_host(text).await,
        }
    }

    async fn send_menu(&mut self) {
        let menu = views::main_menu();
        let sent = match self.menu_message_id {
            Some(old_id) => self.dispatcher.replace_screen(old_id, &menu).await,
            None => self.dispatcher.send_screen(&menu).await,
        };
        if sent.is_some() {
            self.menu_message_id = sent;
        }
    }

    async fn ping(&self) {
        let started = Instant::now();
        let Some(message_id) = self.dispatcher.send_new("🏓 Pong", None, false).await else {
            return;
        };
        let elapsed_ms = started.elapsed().as_millis();
        self.dispatcher
            .edit(message_id, &format!("🏓 Pong ({elapsed_ms} ms)"), None, false)
            .await;
    }

    async fn forward_to_host(&mut self, text: &str) {
        let thread = match navigation::effective_thread(&self.state, self.host.as_ref()).await {
            Ok(Some(thread)) => thread,
            Ok(None) => {
                self.dispatcher
                    .send_screen(&views::no_thread_prompt())
                    .await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to resolve active thread");
                self.dispatcher
                    .send_new("⚠️ Could not reach the host.", None, false)
                    .await;
                return;
            }
        };

        match self.host.post_user_message(&thread.id, text).await {
            Ok(()) => {
                info!(thread_id = %thread.id, "forwarded chat message to host");
                if self.state.message_cache_thread.as_deref() == Some(thread.id.as_str()) {
                    self.state.clear_messages();
                }
                self.dispatcher
                    .send_new(&format!("📨 Sent to {}", thread.title), None, false)
                    .await;
            }
            Err(e) => {
                warn!(error = %e, thread_id = %thread.id, "failed to forward chat message");
                self.dispatcher
                    .send_new("⚠️ Failed to deliver message.", None, false)
                    .await;
            }
        }
    }
}
