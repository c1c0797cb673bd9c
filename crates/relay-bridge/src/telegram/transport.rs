use crate::host::BoxFuture;

use super::api::{BotCommand, InlineKeyboardMarkup, Message, TelegramApi, Update};

/// The remote chat surface as the bridge uses it.
///
/// `TelegramApi` is the production implementation; tests drive the loop and
/// dispatcher through recording fakes.
pub trait ChatTransport: Send + Sync {
    fn send_message<'a>(
        &'a self,
        chat_id: i64,
        text: &'a str,
        reply_markup: Option<&'a InlineKeyboardMarkup>,
        rich: bool,
    ) -> BoxFuture<'a, anyhow::Result<Message>>;

    fn edit_message_text<'a>(
        &'a self,
        chat_id: i64,
        message_id: i64,
        text: &'a str,
        reply_markup: Option<&'a InlineKeyboardMarkup>,
        rich: bool,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn delete_message(&self, chat_id: i64, message_id: i64) -> BoxFuture<'_, anyhow::Result<()>>;

    fn answer_callback_query<'a>(
        &'a self,
        callback_query_id: &'a str,
        text: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: u32,
    ) -> BoxFuture<'_, anyhow::Result<Vec<Update>>>;

    fn delete_webhook(&self) -> BoxFuture<'_, anyhow::Result<()>>;

    fn set_my_commands<'a>(
        &'a self,
        commands: &'a [BotCommand],
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

impl ChatTransport for TelegramApi {
    fn send_message<'a>(
        &'a self,
        chat_id: i64,
        text: &'a str,
        reply_markup: Option<&'a InlineKeyboardMarkup>,
        rich: bool,
    ) -> BoxFuture<'a, anyhow::Result<Message>> {
        Box::pin(TelegramApi::send_message(self, chat_id, text, reply_markup, rich))
    }

    fn edit_message_text<'a>(
        &'a self,
        chat_id: i64,
        message_id: i64,
        text: &'a str,
        reply_markup: Option<&'a InlineKeyboardMarkup>,
        rich: bool,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(TelegramApi::edit_message_text(
            self,
            chat_id,
            message_id,
            text,
            reply_markup,
            rich,
        ))
    }

    fn delete_message(&self, chat_id: i64, message_id: i64) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(TelegramApi::delete_message(self, chat_id, message_id))
    }

    fn answer_callback_query<'a>(
        &'a self,
        callback_query_id: &'a str,
        text: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(TelegramApi::answer_callback_query(
            self,
            callback_query_id,
            text,
        ))
    }

    fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: u32,
    ) -> BoxFuture<'_, anyhow::Result<Vec<Update>>> {
        Box::pin(TelegramApi::get_updates(self, offset, timeout))
    }

    fn delete_webhook(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(TelegramApi::delete_webhook(self))
    }

    fn set_my_commands<'a>(
        &'a self,
        commands: &'a [BotCommand],
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(TelegramApi::set_my_commands(self, commands))
    }
}
