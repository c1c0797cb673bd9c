use super::settings::{read_settings, settings_file_path, write_settings};
use anyhow::Result;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_PORT: u16 = 3017;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub default_thread_id: Option<String>,
    pub poll_interval_ms: u64,
    pub listen_host: String,
    pub listen_port: u16,
}

pub struct BridgeSettingsResult {
    pub settings: BridgeSettings,
    pub saved_to_file: bool,
}

fn non_empty(v: String) -> Option<String> {
    let v = v.trim().to_string();
    if v.is_empty() { None } else { Some(v) }
}

pub fn load_bridge_settings(data_dir: &Path) -> Result<BridgeSettingsResult> {
    load_bridge_settings_with(data_dir, |key| std::env::var(key).ok())
}

/// Resolve settings with env > file > default precedence. Env values that
/// the file does not have yet are written back to it.
pub fn load_bridge_settings_with<F>(data_dir: &Path, env: F) -> Result<BridgeSettingsResult>
where
    F: Fn(&str) -> Option<String>,
{
    let settings_path = settings_file_path(data_dir);
    let mut settings = read_settings(&settings_path)?;
    let mut needs_save = false;

    // telegram_bot_token
    let telegram_bot_token = if let Some(v) = env("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
        if settings.telegram_bot_token.is_none() {
            settings.telegram_bot_token = Some(v.clone());
            needs_save = true;
        }
        Some(v)
    } else {
        settings.telegram_bot_token.clone()
    };

    // telegram_chat_id
    let telegram_chat_id = if let Some(v) = env("TELEGRAM_CHAT_ID").and_then(non_empty) {
        match v.parse::<i64>() {
            Ok(id) => {
                if settings.telegram_chat_id.is_none() {
                    settings.telegram_chat_id = Some(id);
                    needs_save = true;
                }
                Some(id)
            }
            Err(_) => {
                warn!(value = %v, "TELEGRAM_CHAT_ID is not a numeric chat id; ignoring");
                settings.telegram_chat_id
            }
        }
    } else {
        settings.telegram_chat_id
    };

    // default_thread_id
    let default_thread_id = if let Some(v) = env("RELAY_DEFAULT_THREAD_ID").and_then(non_empty) {
        if settings.default_thread_id.is_none() {
            settings.default_thread_id = Some(v.clone());
            needs_save = true;
        }
        Some(v)
    } else {
        settings.default_thread_id.clone()
    };

    // poll_interval_ms
    let poll_interval_ms = match env("RELAY_POLL_INTERVAL_MS").and_then(non_empty) {
        Some(v) => match v.parse::<u64>() {
            Ok(ms) if ms > 0 => {
                if settings.poll_interval_ms.is_none() {
                    settings.poll_interval_ms = Some(ms);
                    needs_save = true;
                }
                ms
            }
            _ => {
                warn!(value = %v, "RELAY_POLL_INTERVAL_MS must be a positive integer; using default");
                settings.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)
            }
        },
        None => settings.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
    };

    // listen_host
    let listen_host = if let Some(v) = env("RELAY_LISTEN_HOST").and_then(non_empty) {
        if settings.listen_host.is_none() {
            settings.listen_host = Some(v.clone());
            needs_save = true;
        }
        v
    } else if let Some(ref v) = settings.listen_host {
        v.clone()
    } else {
        DEFAULT_LISTEN_HOST.into()
    };

    // listen_port
    let listen_port = if let Some(v) = env("RELAY_LISTEN_PORT").and_then(non_empty) {
        let port: u16 = v
            .parse()
            .map_err(|_| anyhow::anyhow!("RELAY_LISTEN_PORT must be a valid port"))?;
        if settings.listen_port.is_none() {
            settings.listen_port = Some(port);
            needs_save = true;
        }
        port
    } else {
        settings.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    };

    if needs_save {
        write_settings(&settings_path, &settings)?;
    }

    Ok(BridgeSettingsResult {
        settings: BridgeSettings {
            telegram_bot_token,
            telegram_chat_id,
            default_thread_id,
            poll_interval_ms,
            listen_host,
            listen_port,
        },
        saved_to_file: needs_save,
    })
}
