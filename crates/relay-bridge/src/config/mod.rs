pub mod bridge_settings;
pub mod ingress_token;
pub mod settings;

use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Env,
    File,
    Generated,
}

/// Credentials the poll loop needs. Present only when both the bot token and
/// the chat id are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramTarget {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub default_thread_id: Option<String>,
    pub poll_interval_ms: u64,
    pub ingress_token: String,
    pub ingress_token_source: TokenSource,
    pub ingress_token_is_new: bool,
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub listen_port: u16,
    pub listen_host: String,
}

impl Configuration {
    pub fn create() -> Result<Self> {
        // Resolve data directory: RELAY_HOME env or ~/.chatrelay
        let data_dir = if let Ok(home) = std::env::var("RELAY_HOME") {
            PathBuf::from(home)
        } else {
            let home = dirs_next::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
            home.join(".chatrelay")
        };
        std::fs::create_dir_all(&data_dir)?;

        let db_path = if let Ok(p) = std::env::var("DB_PATH") {
            PathBuf::from(p)
        } else {
            data_dir.join("chatrelay.db")
        };

        let settings_file = settings::settings_file_path(&data_dir);

        // env > file > default
        let bridge = bridge_settings::load_bridge_settings(&data_dir)?.settings;

        // env > file > generate
        let token = ingress_token::get_or_create_ingress_token(&data_dir)?;

        Ok(Configuration {
            telegram_bot_token: bridge.telegram_bot_token,
            telegram_chat_id: bridge.telegram_chat_id,
            default_thread_id: bridge.default_thread_id,
            poll_interval_ms: bridge.poll_interval_ms,
            ingress_token: token.token,
            ingress_token_source: token.source,
            ingress_token_is_new: token.is_new,
            settings_file,
            data_dir,
            db_path,
            listen_port: bridge.listen_port,
            listen_host: bridge.listen_host,
        })
    }

    pub fn telegram_target(&self) -> Option<TelegramTarget> {
        let bot_token = self.telegram_bot_token.clone()?;
        let chat_id = self.telegram_chat_id?;
        Some(TelegramTarget { bot_token, chat_id })
    }

    /// Names of required options that are not set.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.telegram_bot_token.is_none() {
            missing.push("bot token (TELEGRAM_BOT_TOKEN)");
        }
        if self.telegram_chat_id.is_none() {
            missing.push("chat id (TELEGRAM_CHAT_ID)");
        }
        missing
    }
}
