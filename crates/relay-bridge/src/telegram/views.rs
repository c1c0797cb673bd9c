use std::ops::Range;

use serde_json::Value;

use relay_shared::text::{
    TRUNCATION_MARKER, escape_html, extract_text, label_preview, to_hypertext, truncate_chars,
};
use relay_shared::{MessageSummary, Role, ThreadSummary};

use super::action::Action;
use super::api::{InlineKeyboardButton, InlineKeyboardMarkup};
use super::dispatcher::OUTBOUND_TEXT_LIMIT;

pub const THREAD_PAGE_SIZE: usize = 5;
pub const MESSAGE_PAGE_SIZE: usize = 5;
/// Only the head of the host listing is cached and paged.
pub const THREAD_CACHE_LIMIT: usize = 50;
/// Ceiling on source text rendered for one message or reply.
pub const MESSAGE_BODY_LIMIT: usize = 3500;

const LABEL_PREVIEW_CHARS: usize = 24;
const THREAD_TITLE_CHARS: usize = 40;

/// A rendered chat screen: body text plus optional inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
    /// Body is HTML and must be sent with the HTML parse mode.
    pub rich: bool,
}

impl Screen {
    fn plain(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard: keyboard(rows),
            rich: false,
        }
    }

    fn rich(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard: keyboard(rows),
            rich: true,
        }
    }
}

fn keyboard(rows: Vec<Vec<InlineKeyboardButton>>) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<_> = rows.into_iter().filter(|r| !r.is_empty()).collect();
    (!rows.is_empty()).then_some(InlineKeyboardMarkup {
        inline_keyboard: rows,
    })
}

fn button(text: impl Into<String>, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton {
        text: text.into(),
        callback_data: action.callback_data(),
    }
}

fn menu_row() -> Vec<InlineKeyboardButton> {
    vec![button("🏠 Menu", Action::Menu)]
}

fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size).max(1)
}

/// Clamp a requested page to the last existing one.
pub fn clamp_page(len: usize, page_size: usize, page: usize) -> usize {
    page.min(page_count(len, page_size) - 1)
}

/// Thread indices shown on `page`: `[5p, 5p+5)` within bounds.
pub fn thread_window(len: usize, page: usize) -> Range<usize> {
    let start = (page * THREAD_PAGE_SIZE).min(len);
    let end = (start + THREAD_PAGE_SIZE).min(len);
    start..end
}

/// Ascending message indices shown on `page`, where page 0 is the newest
/// five: `[max(0, N-5(p+1)), N-5p)`.
pub fn message_window(len: usize, page: usize) -> Range<usize> {
    let end = len.saturating_sub(page * MESSAGE_PAGE_SIZE);
    let start = len.saturating_sub((page + 1) * MESSAGE_PAGE_SIZE);
    start..end
}

fn thread_label(thread: &ThreadSummary) -> String {
    let title = if thread.title.trim().is_empty() {
        thread.id.as_str()
    } else {
        thread.title.as_str()
    };
    truncate_chars(&title.replace('\n', " "), THREAD_TITLE_CHARS, "…")
}

pub fn main_menu() -> Screen {
    Screen::plain(
        "🤖 Chat relay\n\nBrowse your assistant threads and read their messages here.",
        vec![
            vec![
                button("📚 Threads", Action::Threads(0)),
                button("💬 Messages", Action::Messages(0)),
            ],
            vec![
                button("📌 Current thread", Action::Current),
                button("🔄 Refresh", Action::Refresh),
            ],
            vec![button("🐞 Debug", Action::Debug)],
        ],
    )
}

pub fn refreshed_menu() -> Screen {
    let mut screen = main_menu();
    screen.text = format!("🔄 Caches and selection cleared.\n\n{}", screen.text);
    screen
}

/// Thread listing page with a ✅ on the selected thread. `page` must already
/// be clamped.
pub fn thread_list(threads: &[ThreadSummary], page: usize, selected: Option<&str>) -> Screen {
    if threads.is_empty() {
        return Screen::plain("📚 No threads found.", vec![menu_row()]);
    }

    let window = thread_window(threads.len(), page);
    let mut rows: Vec<Vec<InlineKeyboardButton>> = threads[window.clone()]
        .iter()
        .enumerate()
        .map(|(offset, thread)| {
            let idx = window.start + offset;
            let mark = if selected == Some(thread.id.as_str()) {
                " ✅"
            } else {
                ""
            };
            vec![button(
                format!("{}. {}{mark}", idx + 1, thread_label(thread)),
                Action::Select(idx),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(button("⬅️ Prev", Action::Threads(page - 1)));
    }
    if window.end < threads.len() {
        nav.push(button("Next ➡️", Action::Threads(page + 1)));
    }
    rows.push(nav);
    rows.push(menu_row());

    Screen::plain(
        format!(
            "📚 Threads (page {}/{})\nTap a thread to select it.",
            page + 1,
            page_count(threads.len(), THREAD_PAGE_SIZE)
        ),
        rows,
    )
}

pub fn thread_selected(thread: &ThreadSummary) -> Screen {
    Screen::plain(
        format!("✅ Selected: {}", thread_label(thread)),
        vec![
            vec![button("💬 View messages", Action::Messages(0))],
            vec![button("📚 Threads", Action::Threads(0))],
            menu_row(),
        ],
    )
}

pub fn no_thread_prompt() -> Screen {
    Screen::plain(
        "No thread selected. Pick one from the thread list first.",
        vec![vec![button("📚 Choose a thread", Action::Threads(0))]],
    )
}

/// Message listing page, newest first. `page` must already be clamped.
pub fn message_list(thread_title: &str, messages: &[MessageSummary], page: usize) -> Screen {
    let title = truncate_chars(thread_title, THREAD_TITLE_CHARS, "…");
    if messages.is_empty() {
        return Screen::plain(
            format!("💬 {title}\n\nNo messages yet."),
            vec![
                vec![button("📚 Threads", Action::Threads(0))],
                menu_row(),
            ],
        );
    }

    let window = message_window(messages.len(), page);
    let mut rows: Vec<Vec<InlineKeyboardButton>> = window
        .clone()
        .rev()
        .map(|idx| {
            let msg = &messages[idx];
            let preview = label_preview(&extract_text(&msg.content), LABEL_PREVIEW_CHARS);
            vec![button(
                format!("{} {preview}", msg.role.glyph()),
                Action::View(idx),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if window.start > 0 {
        nav.push(button("⬅️ Older", Action::Messages(page + 1)));
    }
    if page > 0 {
        nav.push(button("Newer ➡️", Action::Messages(page - 1)));
    }
    rows.push(nav);
    rows.push(vec![
        button("📚 Threads", Action::Threads(0)),
        button("🏠 Menu", Action::Menu),
    ]);

    Screen::plain(
        format!(
            "💬 {title}\nMessages {}–{} of {} (newest first)",
            window.start + 1,
            window.end,
            messages.len()
        ),
        rows,
    )
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

fn format_timestamp(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Capped source text converted to Telegram HTML.
///
/// Escaping and code tags grow the text, so the source cap shrinks until
/// `header` plus the rendered body fits in one outbound message. The HTML
/// itself is never cut.
fn render_with_body(header: &str, content: &Value) -> String {
    let text = extract_text(content);
    if text.trim().is_empty() {
        return format!("{header}\n\n<i>(no text content)</i>");
    }
    let budget = OUTBOUND_TEXT_LIMIT.saturating_sub(header.chars().count() + 2);
    let mut cap = text.chars().count().min(MESSAGE_BODY_LIMIT);
    loop {
        let body = to_hypertext(&truncate_chars(&text, cap, TRUNCATION_MARKER));
        let len = body.chars().count();
        if len <= budget || cap == 0 {
            return format!("{header}\n\n{body}");
        }
        cap = (cap * budget / len).min(cap - 1);
    }
}

pub fn message_detail(msg: &MessageSummary, back_page: usize) -> Screen {
    let mut header = format!("{} <b>{}</b>", msg.role.glyph(), role_name(msg.role));
    if let Some(ts) = format_timestamp(msg.created_at) {
        header.push_str(&format!(" · {ts}"));
    }
    Screen::rich(
        render_with_body(&header, &msg.content),
        vec![
            vec![button(
                format!("⬅️ Back to page {}", back_page + 1),
                Action::Messages(back_page),
            )],
            menu_row(),
        ],
    )
}

/// Where the "current thread" answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentThread {
    /// Chosen in this chat; title is absent when the thread is not cached.
    Selected { id: String, title: Option<String> },
    /// Focused in the host UI.
    HostActive(ThreadSummary),
    None,
}

pub fn current_thread(current: &CurrentThread) -> Screen {
    let text = match current {
        CurrentThread::Selected { id, title } => match title {
            Some(title) => format!("📌 Selected thread: {title}\nID: {id}"),
            None => format!("📌 Selected thread: {id}"),
        },
        CurrentThread::HostActive(thread) => format!(
            "📌 No thread selected here.\nHost active thread: {}\nID: {}",
            thread_label(thread),
            thread.id
        ),
        CurrentThread::None => "📌 No thread selected.".to_string(),
    };
    Screen::plain(
        text,
        vec![
            vec![
                button("💬 Messages", Action::Messages(0)),
                button("📚 Threads", Action::Threads(0)),
            ],
            menu_row(),
        ],
    )
}

/// Counters shown by the debug screen.
#[derive(Debug, Clone, Default)]
pub struct DebugSnapshot {
    pub thread_cache_len: usize,
    pub message_cache_len: usize,
    pub message_page: usize,
    pub selected_thread_id: Option<String>,
    pub update_cursor: i64,
    pub polling_active: bool,
    pub has_bot_token: bool,
    pub has_chat_id: bool,
    pub has_default_thread: bool,
    pub poll_interval_ms: u64,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

pub fn debug_info(snapshot: &DebugSnapshot) -> Screen {
    let lines = [
        "🐞 Debug".to_string(),
        String::new(),
        format!("Threads cached: {}", snapshot.thread_cache_len),
        format!("Messages cached: {}", snapshot.message_cache_len),
        format!("Message page: {}", snapshot.message_page),
        format!(
            "Selected thread: {}",
            snapshot.selected_thread_id.as_deref().unwrap_or("(none)")
        ),
        format!("Update cursor: {}", snapshot.update_cursor),
        format!("Polling: {}", yes_no(snapshot.polling_active)),
        format!("Bot token set: {}", yes_no(snapshot.has_bot_token)),
        format!("Chat id set: {}", yes_no(snapshot.has_chat_id)),
        format!("Default thread set: {}", yes_no(snapshot.has_default_thread)),
        format!("Poll interval: {} ms", snapshot.poll_interval_ms),
    ];
    Screen::plain(lines.join("\n"), vec![menu_row()])
}

/// An assistant reply pushed into the chat unprompted.
pub fn assistant_reply(thread_title: &str, content: &Value) -> Screen {
    let header = format!(
        "🤖 <b>{}</b>",
        escape_html(&truncate_chars(thread_title, THREAD_TITLE_CHARS, "…"))
    );
    Screen::rich(render_with_body(&header, content), vec![])
}
