use tracing::{debug, warn};

use relay_shared::{MessageSummary, ThreadSummary};

use crate::host::{HostChat, KeyValueStore};

use super::action::Action;
use super::views::{
    self, CurrentThread, DebugSnapshot, MESSAGE_PAGE_SIZE, Screen, THREAD_CACHE_LIMIT,
    THREAD_PAGE_SIZE,
};

/// Key of the persisted selection, relative to the bridge's kv scope.
pub const SELECTED_THREAD_KEY: &str = "selectedThreadId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Menu,
    ThreadList(usize),
    ThreadDetail(usize),
    MessageList(usize),
    MessageDetail(usize),
    CurrentThreadInfo,
    DebugInfo,
}

/// Per-loop browsing state. Owned by the session loop task and only mutated
/// while an update is being dispatched.
#[derive(Debug, Default)]
pub struct SessionState {
    pub selected_thread_id: Option<String>,
    pub thread_cache: Vec<ThreadSummary>,
    pub message_cache: Vec<MessageSummary>,
    /// Thread the message cache was fetched for.
    pub message_cache_thread: Option<String>,
    pub message_page: usize,
    pub update_cursor: i64,
    pub polling_active: bool,
    pub nav: NavState,
}

impl SessionState {
    pub fn new(selected_thread_id: Option<String>) -> Self {
        Self {
            selected_thread_id,
            ..Self::default()
        }
    }

    /// Drop the message cache together with its page.
    pub fn clear_messages(&mut self) {
        self.message_cache.clear();
        self.message_cache_thread = None;
        self.message_page = 0;
    }

    fn cached_title(&self, thread_id: &str) -> Option<String> {
        self.thread_cache
            .iter()
            .find(|t| t.id == thread_id)
            .map(|t| t.title.clone())
    }
}

/// Which configuration values were present at startup, for the debug screen.
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    pub has_bot_token: bool,
    pub has_chat_id: bool,
    pub has_default_thread: bool,
    pub poll_interval_ms: u64,
}

pub struct NavContext<'a> {
    pub host: &'a dyn HostChat,
    pub kv: &'a dyn KeyValueStore,
    pub flags: &'a ConfigFlags,
}

/// Result of one action: what to show and what to say in the callback
/// acknowledgement.
#[derive(Debug, Default)]
pub struct Outcome {
    pub screen: Option<Screen>,
    pub notice: Option<String>,
}

impl Outcome {
    fn show(screen: Screen) -> Self {
        Self {
            screen: Some(screen),
            notice: None,
        }
    }

    fn notice(text: &str) -> Self {
        Self {
            screen: None,
            notice: Some(text.to_string()),
        }
    }
}

/// Thread the chat is looking at: the selection, else the host's focus.
pub struct EffectiveThread {
    pub id: String,
    pub title: String,
}

/// Resolve the effective thread. Host failures propagate to the caller.
pub async fn effective_thread(
    state: &SessionState,
    host: &dyn HostChat,
) -> anyhow::Result<Option<EffectiveThread>> {
    if let Some(id) = &state.selected_thread_id {
        let title = state.cached_title(id).unwrap_or_else(|| id.clone());
        return Ok(Some(EffectiveThread {
            id: id.clone(),
            title,
        }));
    }
    Ok(host.get_active_thread().await?.map(|t| EffectiveThread {
        id: t.id,
        title: t.title,
    }))
}

/// Apply one decoded action. State only changes when the action succeeds;
/// host failures become a notice.
pub async fn apply(state: &mut SessionState, ctx: &NavContext<'_>, action: &Action) -> Outcome {
    match action {
        Action::Menu => {
            state.nav = NavState::Menu;
            Outcome::show(views::main_menu())
        }
        Action::Threads(page) => show_threads(state, ctx, *page).await,
        Action::Select(idx) => select_thread(state, ctx, *idx).await,
        Action::Messages(page) => show_messages(state, ctx, *page).await,
        Action::View(idx) => {
            let Some(msg) = state.message_cache.get(*idx) else {
                return Outcome::notice("Message not found, reload the list");
            };
            let screen = views::message_detail(msg, state.message_page);
            state.nav = NavState::MessageDetail(*idx);
            Outcome::show(screen)
        }
        Action::Current => {
            let current = current_thread(state, ctx.host).await;
            state.nav = NavState::CurrentThreadInfo;
            Outcome::show(views::current_thread(&current))
        }
        Action::Refresh => {
            state.thread_cache.clear();
            state.clear_messages();
            state.selected_thread_id = None;
            if let Err(e) = ctx.kv.remove(SELECTED_THREAD_KEY).await {
                warn!(error = %e, "failed to clear persisted thread selection");
            }
            state.nav = NavState::Menu;
            Outcome {
                screen: Some(views::refreshed_menu()),
                notice: Some("Cleared".to_string()),
            }
        }
        Action::Debug => {
            let snapshot = DebugSnapshot {
                thread_cache_len: state.thread_cache.len(),
                message_cache_len: state.message_cache.len(),
                message_page: state.message_page,
                selected_thread_id: state.selected_thread_id.clone(),
                update_cursor: state.update_cursor,
                polling_active: state.polling_active,
                has_bot_token: ctx.flags.has_bot_token,
                has_chat_id: ctx.flags.has_chat_id,
                has_default_thread: ctx.flags.has_default_thread,
                poll_interval_ms: ctx.flags.poll_interval_ms,
            };
            state.nav = NavState::DebugInfo;
            Outcome::show(views::debug_info(&snapshot))
        }
        Action::Unknown(raw) => {
            debug!(data = %raw, "unknown callback action");
            Outcome::notice("Unknown action")
        }
    }
}

async fn show_threads(state: &mut SessionState, ctx: &NavContext<'_>, page: usize) -> Outcome {
    let mut threads = match ctx.host.list_threads().await {
        Ok(threads) => threads,
        Err(e) => {
            warn!(error = %e, "failed to list threads");
            return Outcome::notice("⚠️ Failed to load threads");
        }
    };
    threads.truncate(THREAD_CACHE_LIMIT);

    let page = views::clamp_page(threads.len(), THREAD_PAGE_SIZE, page);
    state.thread_cache = threads;
    state.nav = NavState::ThreadList(page);
    Outcome::show(views::thread_list(
        &state.thread_cache,
        page,
        state.selected_thread_id.as_deref(),
    ))
}

async fn select_thread(state: &mut SessionState, ctx: &NavContext<'_>, idx: usize) -> Outcome {
    let Some(thread) = state.thread_cache.get(idx).cloned() else {
        return Outcome::notice("Thread not found, reload the list");
    };

    if let Err(e) = ctx.kv.set(SELECTED_THREAD_KEY, &thread.id).await {
        warn!(error = %e, thread_id = %thread.id, "failed to persist thread selection");
    }
    state.selected_thread_id = Some(thread.id.clone());
    state.clear_messages();
    state.nav = NavState::ThreadDetail(idx);
    Outcome::show(views::thread_selected(&thread))
}

async fn show_messages(state: &mut SessionState, ctx: &NavContext<'_>, page: usize) -> Outcome {
    let thread = match effective_thread(state, ctx.host).await {
        Ok(Some(thread)) => thread,
        Ok(None) => return Outcome::show(views::no_thread_prompt()),
        Err(e) => {
            warn!(error = %e, "failed to resolve active thread");
            return Outcome::notice("⚠️ Failed to load messages");
        }
    };

    let cache_hit = !state.message_cache.is_empty()
        && state.message_cache_thread.as_deref() == Some(thread.id.as_str());
    if !cache_hit {
        match ctx.host.get_messages(&thread.id).await {
            Ok(messages) => {
                state.message_cache = messages;
                state.message_cache_thread = Some(thread.id.clone());
                state.message_page = 0;
            }
            Err(e) => {
                warn!(error = %e, thread_id = %thread.id, "failed to load messages");
                return Outcome::notice("⚠️ Failed to load messages");
            }
        }
    }

    let page = views::clamp_page(state.message_cache.len(), MESSAGE_PAGE_SIZE, page);
    state.message_page = page;
    state.nav = NavState::MessageList(page);
    Outcome::show(views::message_list(&thread.title, &state.message_cache, page))
}

async fn current_thread(state: &SessionState, host: &dyn HostChat) -> CurrentThread {
    if let Some(id) = &state.selected_thread_id {
        return CurrentThread::Selected {
            id: id.clone(),
            title: state.cached_title(id),
        };
    }
    match host.get_active_thread().await {
        Ok(Some(thread)) => CurrentThread::HostActive(thread),
        Ok(None) => CurrentThread::None,
        Err(e) => {
            warn!(error = %e, "failed to query host active thread");
            CurrentThread::None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use relay_shared::Role;
    use serde_json::json;

    use super::*;
    use crate::host::BoxFuture;

    /// In-memory host with switchable failures.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub threads: Vec<ThreadSummary>,
        pub messages: HashMap<String, Vec<MessageSummary>>,
        pub active: Option<ThreadSummary>,
        pub fail: AtomicBool,
        pub message_fetches: AtomicUsize,
        pub posted: Mutex<Vec<(String, String)>>,
    }

    impl FakeHost {
        pub fn with_threads(n: usize) -> Self {
            let threads: Vec<_> = (0..n)
                .map(|i| ThreadSummary {
                    id: format!("t{i}"),
                    title: format!("Thread {i}"),
                })
                .collect();
            Self {
                threads,
                ..Self::default()
            }
        }

        pub fn with_messages(mut self, thread_id: &str, n: usize) -> Self {
            let msgs = (0..n)
                .map(|i| MessageSummary {
                    id: format!("{thread_id}-m{i}"),
                    role: Role::User,
                    content: json!(format!("msg {i}")),
                    created_at: i as i64,
                })
                .collect();
            self.messages.insert(thread_id.to_string(), msgs);
            self
        }

        fn check(&self) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("host unavailable");
            }
            Ok(())
        }
    }

    impl HostChat for FakeHost {
        fn list_threads(&self) -> BoxFuture<'_, anyhow::Result<Vec<ThreadSummary>>> {
            Box::pin(async move {
                self.check()?;
                Ok(self.threads.clone())
            })
        }

        fn get_messages<'a>(
            &'a self,
            thread_id: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<Vec<MessageSummary>>> {
            Box::pin(async move {
                self.check()?;
                self.message_fetches.fetch_add(1, Ordering::SeqCst);
                Ok(self.messages.get(thread_id).cloned().unwrap_or_default())
            })
        }

        fn get_active_thread(&self) -> BoxFuture<'_, anyhow::Result<Option<ThreadSummary>>> {
            Box::pin(async move {
                self.check()?;
                Ok(self.active.clone())
            })
        }

        fn post_user_message<'a>(
            &'a self,
            thread_id: &'a str,
            text: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.check()?;
                self.posted
                    .lock()
                    .unwrap()
                    .push((thread_id.to_string(), text.to_string()));
                Ok(())
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryKv {
        pub map: Mutex<HashMap<String, String>>,
    }

    impl KeyValueStore for MemoryKv {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
            Box::pin(async move { Ok(self.map.lock().unwrap().get(key).cloned()) })
        }

        fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.map
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), value.to_string());
                Ok(())
            })
        }

        fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.map.lock().unwrap().remove(key);
                Ok(())
            })
        }
    }

    struct Harness {
        host: FakeHost,
        kv: MemoryKv,
        flags: ConfigFlags,
        state: SessionState,
    }

    impl Harness {
        fn new(host: FakeHost) -> Self {
            Self {
                host,
                kv: MemoryKv::default(),
                flags: ConfigFlags::default(),
                state: SessionState::default(),
            }
        }

        async fn press(&mut self, data: &str) -> Outcome {
            let ctx = NavContext {
                host: &self.host,
                kv: &self.kv,
                flags: &self.flags,
            };
            apply(&mut self.state, &ctx, &Action::parse(data)).await
        }
    }

    fn callbacks(outcome: &Outcome) -> Vec<String> {
        outcome
            .screen
            .as_ref()
            .and_then(|s| s.keyboard.as_ref())
            .map(|k| {
                k.inline_keyboard
                    .iter()
                    .flatten()
                    .map(|b| b.callback_data.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn selects(outcome: &Outcome) -> usize {
        callbacks(outcome)
            .iter()
            .filter(|c| c.starts_with("select:"))
            .count()
    }

    #[tokio::test]
    async fn thread_pages_sum_to_cache_size() {
        let mut h = Harness::new(FakeHost::with_threads(12));
        let mut total = 0;
        for page in 0..3 {
            let outcome = h.press(&format!("threads:{page}")).await;
            total += selects(&outcome);
        }
        assert_eq!(total, 12);
        assert_eq!(h.state.nav, NavState::ThreadList(2));
    }

    #[tokio::test]
    async fn fresh_session_without_thread_gets_prompt() {
        let mut h = Harness::new(FakeHost::default());
        let outcome = h.press("messages:0").await;
        assert_eq!(callbacks(&outcome), ["threads:0"]);
        assert!(h.state.message_cache.is_empty());
    }

    #[tokio::test]
    async fn message_pages_are_stable_across_round_trip() {
        let host = FakeHost::with_threads(1).with_messages("t0", 23);
        let mut h = Harness::new(host);
        h.state.selected_thread_id = Some("t0".into());

        let first = callbacks(&h.press("messages:3").await);
        h.press("messages:2").await;
        let again = callbacks(&h.press("messages:3").await);
        assert_eq!(first, again);
        assert_eq!(h.host.message_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn thread_cache_keeps_first_fifty() {
        let mut h = Harness::new(FakeHost::with_threads(80));
        h.press("threads:0").await;
        assert_eq!(h.state.thread_cache.len(), THREAD_CACHE_LIMIT);
        assert_eq!(h.state.thread_cache[49].id, "t49");
    }

    #[tokio::test]
    async fn select_persists_and_resets_messages() {
        let host = FakeHost::with_threads(3).with_messages("t0", 8).with_messages("t2", 2);
        let mut h = Harness::new(host);
        h.press("threads:0").await;
        h.press("select:0").await;
        h.press("messages:1").await;
        assert_eq!(h.state.message_page, 1);

        let outcome = h.press("select:2").await;
        assert_eq!(h.state.selected_thread_id.as_deref(), Some("t2"));
        assert!(h.state.message_cache.is_empty());
        assert_eq!(h.state.message_page, 0);
        assert_eq!(h.state.nav, NavState::ThreadDetail(2));
        assert!(callbacks(&outcome).contains(&"messages:0".to_string()));
        assert_eq!(
            h.kv.map.lock().unwrap().get(SELECTED_THREAD_KEY).map(String::as_str),
            Some("t2")
        );
    }

    #[tokio::test]
    async fn select_out_of_range_leaves_state() {
        let mut h = Harness::new(FakeHost::with_threads(2));
        h.press("threads:0").await;
        let outcome = h.press("select:9").await;
        assert!(outcome.screen.is_none());
        assert!(outcome.notice.is_some());
        assert!(h.state.selected_thread_id.is_none());
        assert_eq!(h.state.nav, NavState::ThreadList(0));
    }

    #[tokio::test]
    async fn message_page_window_for_twelve() {
        let host = FakeHost::with_threads(1).with_messages("t0", 12);
        let mut h = Harness::new(host);
        h.state.selected_thread_id = Some("t0".into());

        let outcome = h.press("messages:1").await;
        let data = callbacks(&outcome);
        let views: Vec<_> = data.iter().filter(|c| c.starts_with("view:")).collect();
        assert_eq!(views, ["view:6", "view:5", "view:4", "view:3", "view:2"]);
        assert!(data.contains(&"messages:2".to_string()), "older");
        assert!(data.contains(&"messages:0".to_string()), "newer");
        assert_eq!(h.state.nav, NavState::MessageList(1));
    }

    #[tokio::test]
    async fn view_then_back_returns_to_same_page() {
        let host = FakeHost::with_threads(1).with_messages("t0", 12);
        let mut h = Harness::new(host);
        h.state.selected_thread_id = Some("t0".into());

        let list = h.press("messages:1").await;
        let detail = h.press("view:4").await;
        assert_eq!(h.state.nav, NavState::MessageDetail(4));
        assert!(callbacks(&detail).contains(&"messages:1".to_string()));

        let back = h.press("messages:1").await;
        assert_eq!(callbacks(&back), callbacks(&list));
        assert_eq!(h.host.message_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_past_end_is_clamped() {
        let host = FakeHost::with_threads(1).with_messages("t0", 7);
        let mut h = Harness::new(host);
        h.state.selected_thread_id = Some("t0".into());
        h.press("messages:9").await;
        assert_eq!(h.state.message_page, 1);
        assert_eq!(h.state.nav, NavState::MessageList(1));
    }

    #[tokio::test]
    async fn host_active_thread_is_used_without_selection() {
        let mut host = FakeHost::with_threads(2).with_messages("t1", 3);
        host.active = Some(host.threads[1].clone());
        let mut h = Harness::new(host);

        let outcome = h.press("messages:0").await;
        assert_eq!(selects(&outcome), 0);
        assert_eq!(h.state.message_cache.len(), 3);
        assert_eq!(h.state.message_cache_thread.as_deref(), Some("t1"));
        assert!(h.state.selected_thread_id.is_none());
    }

    #[tokio::test]
    async fn refresh_then_messages_prompts_for_thread() {
        let host = FakeHost::with_threads(2).with_messages("t0", 3);
        let mut h = Harness::new(host);
        h.press("threads:0").await;
        h.press("select:0").await;
        h.press("messages:0").await;

        h.press("refresh").await;
        assert!(h.state.thread_cache.is_empty());
        assert!(h.state.message_cache.is_empty());
        assert!(h.state.selected_thread_id.is_none());
        assert_eq!(h.state.nav, NavState::Menu);
        assert!(h.kv.map.lock().unwrap().is_empty());

        let outcome = h.press("messages:0").await;
        assert_eq!(callbacks(&outcome), ["threads:0"]);
    }

    #[tokio::test]
    async fn host_failure_leaves_state_unchanged() {
        let host = FakeHost::with_threads(4);
        let mut h = Harness::new(host);
        h.press("threads:0").await;
        h.press("select:1").await;

        h.host.fail.store(true, Ordering::SeqCst);
        let before_nav = h.state.nav;
        let outcome = h.press("threads:0").await;
        assert!(outcome.screen.is_none());
        assert_eq!(outcome.notice.as_deref(), Some("⚠️ Failed to load threads"));
        assert_eq!(h.state.thread_cache.len(), 4);
        assert_eq!(h.state.nav, before_nav);

        let outcome = h.press("messages:0").await;
        assert!(outcome.screen.is_none());
        assert!(h.state.message_cache.is_empty());
    }

    #[tokio::test]
    async fn unknown_action_only_acknowledges() {
        let mut h = Harness::new(FakeHost::with_threads(1));
        h.press("threads:0").await;
        let outcome = h.press("m:0").await;
        assert!(outcome.screen.is_none());
        assert_eq!(outcome.notice.as_deref(), Some("Unknown action"));
        assert_eq!(h.state.nav, NavState::ThreadList(0));
    }

    #[tokio::test]
    async fn current_prefers_selection_then_host() {
        let mut host = FakeHost::with_threads(2);
        host.active = Some(host.threads[1].clone());
        let mut h = Harness::new(host);

        let outcome = h.press("current").await;
        assert!(outcome.screen.unwrap().text.contains("Host active thread: Thread 1"));

        h.press("threads:0").await;
        h.press("select:0").await;
        let outcome = h.press("current").await;
        assert!(outcome.screen.unwrap().text.contains("Selected thread: Thread 0"));
        assert_eq!(h.state.nav, NavState::CurrentThreadInfo);
    }

    #[tokio::test]
    async fn debug_reports_counters() {
        let mut h = Harness::new(FakeHost::with_threads(3));
        h.flags.poll_interval_ms = 2000;
        h.flags.has_bot_token = true;
        h.state.update_cursor = 41;
        h.press("threads:0").await;
        let outcome = h.press("debug").await;
        let text = outcome.screen.unwrap().text;
        assert!(text.contains("Threads cached: 3"));
        assert!(text.contains("Update cursor: 41"));
        assert!(text.contains("Bot token set: yes"));
        assert!(text.contains("Chat id set: no"));
        assert!(text.contains("Poll interval: 2000 ms"));
    }
}
