use std::sync::Arc;

use tracing::{debug, warn};

use relay_shared::text::{TRUNCATION_MARKER, hypertext_to_plain, truncate_chars};

use super::api::InlineKeyboardMarkup;
use super::transport::ChatTransport;
use super::views::Screen;

/// Hard ceiling on outbound text, under Telegram's 4096 limit.
pub const OUTBOUND_TEXT_LIMIT: usize = 4000;

/// Marker included, the result never exceeds `OUTBOUND_TEXT_LIMIT` chars.
///
/// HTML is never cut: an oversized rich text is sent as plain text instead,
/// with the returned flag cleared.
fn cap_outbound(text: &str, rich: bool) -> (String, bool) {
    if text.chars().count() <= OUTBOUND_TEXT_LIMIT {
        return (text.to_string(), rich);
    }
    let keep = OUTBOUND_TEXT_LIMIT - TRUNCATION_MARKER.chars().count();
    if rich {
        warn!(chars = text.chars().count(), "rich text over limit, sending as plain text");
        let plain = hypertext_to_plain(text);
        return (truncate_chars(&plain, keep, TRUNCATION_MARKER), false);
    }
    (truncate_chars(text, keep, TRUNCATION_MARKER), rich)
}

/// Sends, edits and replaces messages in the configured chat.
///
/// Transport failures are logged and reported as `None`/`false`; nothing
/// here returns an error.
pub struct OutboundDispatcher {
    transport: Arc<dyn ChatTransport>,
    chat_id: i64,
}

impl OutboundDispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, chat_id: i64) -> Self {
        Self { transport, chat_id }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Send a new message. Returns its id on success.
    pub async fn send_new(
        &self,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> Option<i64> {
        let (text, rich) = cap_outbound(text, rich);
        match self
            .transport
            .send_message(self.chat_id, &text, keyboard, rich)
            .await
        {
            Ok(msg) => Some(msg.message_id),
            Err(e) => {
                warn!(error = %e, "failed to send message");
                None
            }
        }
    }

    /// Edit an existing message in place.
    pub async fn edit(
        &self,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> bool {
        let (text, rich) = cap_outbound(text, rich);
        match self
            .transport
            .edit_message_text(self.chat_id, message_id, &text, keyboard, rich)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, message_id, "edit failed");
                false
            }
        }
    }

    /// Edit `message_id` if given; when there is nothing to edit or the edit
    /// fails, send the same content as a new message exactly once.
    pub async fn edit_or_send(
        &self,
        message_id: Option<i64>,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> Option<i64> {
        if let Some(id) = message_id
            && self.edit(id, text, keyboard, rich).await
        {
            return Some(id);
        }
        self.send_new(text, keyboard, rich).await
    }

    /// Send the replacement first; delete `old_id` only once the send is
    /// confirmed.
    pub async fn replace_and_delete(
        &self,
        old_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> Option<i64> {
        let new_id = self.send_new(text, keyboard, rich).await?;
        if let Err(e) = self.transport.delete_message(self.chat_id, old_id).await {
            warn!(error = %e, old_id, "failed to delete replaced message");
        }
        Some(new_id)
    }

    pub async fn replace_screen(&self, old_id: i64, screen: &Screen) -> Option<i64> {
        self.replace_and_delete(old_id, &screen.text, screen.keyboard.as_ref(), screen.rich)
            .await
    }

    pub async fn send_screen(&self, screen: &Screen) -> Option<i64> {
        self.send_new(&screen.text, screen.keyboard.as_ref(), screen.rich)
            .await
    }

    pub async fn show_screen(&self, message_id: Option<i64>, screen: &Screen) -> Option<i64> {
        self.edit_or_send(message_id, &screen.text, screen.keyboard.as_ref(), screen.rich)
            .await
    }

    /// Acknowledge a button press, optionally with a toast.
    pub async fn answer(&self, callback_query_id: &str, notice: Option<&str>) {
        if let Err(e) = self
            .transport
            .answer_callback_query(callback_query_id, notice)
            .await
        {
            debug!(error = %e, "failed to answer callback query");
        }
    }
}
