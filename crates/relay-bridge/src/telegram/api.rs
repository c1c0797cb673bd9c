use std::time::Duration;

use anyhow::{Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Minimal Telegram Bot API client using reqwest.
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

// --- Request/response types ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

const PARSE_MODE_HTML: &str = "HTML";

/// Long-poll requests get this much slack on top of the server-side wait.
const LONG_POLL_SLACK_SECS: u64 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn message_body(
    chat_id: i64,
    text: &str,
    reply_markup: Option<&InlineKeyboardMarkup>,
    rich: bool,
) -> Result<serde_json::Value> {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "disable_web_page_preview": true,
    });
    if let Some(markup) = reply_markup {
        body["reply_markup"] = serde_json::to_value(markup)?;
    }
    if rich {
        body["parse_mode"] = serde_json::Value::String(PARSE_MODE_HTML.into());
    }
    Ok(body)
}

impl TelegramApi {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> Result<Message> {
        let body = message_body(chat_id, text, reply_markup, rich)?;
        self.call("sendMessage", &body, REQUEST_TIMEOUT).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
        rich: bool,
    ) -> Result<()> {
        let mut body = message_body(chat_id, text, reply_markup, rich)?;
        body["message_id"] = serde_json::Value::Number(message_id.into());
        // Result is the edited Message, or `true` for inline messages.
        self.call::<serde_json::Value>("editMessageText", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        self.call::<bool>("deleteMessage", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "callback_query_id": callback_query_id,
        });
        if let Some(t) = text {
            body["text"] = serde_json::Value::String(t.to_string());
        }
        self.call::<bool>("answerCallbackQuery", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout: u32) -> Result<Vec<Update>> {
        let mut body = serde_json::json!({
            "timeout": timeout,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(off) = offset {
            body["offset"] = serde_json::Value::Number(off.into());
        }
        let wait = Duration::from_secs(timeout as u64 + LONG_POLL_SLACK_SECS);
        self.call("getUpdates", &body, wait).await
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let body = serde_json::json!({ "drop_pending_updates": false });
        self.call::<bool>("deleteWebhook", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let body = serde_json::json!({ "commands": commands });
        self.call::<bool>("setMyCommands", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let resp: ApiResponse<T> = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .timeout(timeout)
            .send()
            .await?
            .json()
            .await?;
        unwrap_response(method, resp)
    }
}

fn unwrap_response<T>(method: &str, resp: ApiResponse<T>) -> Result<T> {
    if !resp.ok {
        bail!(
            "Telegram API {method} failed: {}",
            resp.description.unwrap_or_default()
        );
    }
    match resp.result {
        Some(result) => Ok(result),
        None => bail!("Telegram API {method} returned no result"),
    }
}
