use super::TokenSource;
use super::settings::{read_settings, settings_file_path, write_settings};
use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::path::Path;

pub struct IngressTokenResult {
    pub token: String,
    pub source: TokenSource,
    pub is_new: bool,
}

/// Generate a 32-byte base64url token (~43 chars).
fn generate_secure_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {e}"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn is_weak_token(token: &str) -> bool {
    if token.len() < 16 {
        return true;
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let mut chars = token.chars();
    if let Some(first) = chars.next()
        && chars.all(|c| c == first)
    {
        return true;
    }
    let lower = token.to_lowercase();
    ["abc", "123", "password", "secret", "token"]
        .iter()
        .any(|p| lower.starts_with(p))
}

pub fn get_or_create_ingress_token(data_dir: &Path) -> Result<IngressTokenResult> {
    get_or_create_ingress_token_with(data_dir, |key| std::env::var(key).ok())
}

/// Get or create the host ingress token. Priority: env > file > generate.
pub fn get_or_create_ingress_token_with<F>(data_dir: &Path, env: F) -> Result<IngressTokenResult>
where
    F: Fn(&str) -> Option<String>,
{
    let settings_path = settings_file_path(data_dir);

    // 1. Check env
    if let Some(token) = env("RELAY_INGRESS_TOKEN").filter(|t| !t.is_empty()) {
        if is_weak_token(&token) {
            tracing::warn!("RELAY_INGRESS_TOKEN appears to be weak");
        }
        if let Ok(mut settings) = read_settings(&settings_path)
            && settings.ingress_token.is_none()
        {
            settings.ingress_token = Some(token.clone());
            let _ = write_settings(&settings_path, &settings);
        }
        return Ok(IngressTokenResult {
            token,
            source: TokenSource::Env,
            is_new: false,
        });
    }

    // 2. Check file
    let mut settings = read_settings(&settings_path)?;
    if let Some(ref token) = settings.ingress_token {
        return Ok(IngressTokenResult {
            token: token.clone(),
            source: TokenSource::File,
            is_new: false,
        });
    }

    // 3. Generate
    let token = generate_secure_token()?;
    settings.ingress_token = Some(token.clone());
    write_settings(&settings_path, &settings)?;

    Ok(IngressTokenResult {
        token,
        source: TokenSource::Generated,
        is_new: true,
    })
}

/// Constant-time comparison of two strings.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    a_bytes.len() == b_bytes.len() && a_bytes.ct_eq(b_bytes).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn generates_and_reuses_token() {
        let dir = tempfile::tempdir().unwrap();
        let first = get_or_create_ingress_token_with(dir.path(), no_env).unwrap();
        assert_eq!(first.source, TokenSource::Generated);
        assert!(first.is_new);
        assert_eq!(first.token.len(), 43);

        let second = get_or_create_ingress_token_with(dir.path(), no_env).unwrap();
        assert_eq!(second.source, TokenSource::File);
        assert_eq!(second.token, first.token);
    }

    #[test]
    fn env_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let env = |key: &str| {
            (key == "RELAY_INGRESS_TOKEN").then(|| "k7Qm2xVw9pLr4tYz8nBc".to_string())
        };
        let result = get_or_create_ingress_token_with(dir.path(), env).unwrap();
        assert_eq!(result.source, TokenSource::Env);
        assert_eq!(result.token, "k7Qm2xVw9pLr4tYz8nBc");
    }

    #[test]
    fn weak_tokens() {
        assert!(is_weak_token("short"));
        assert!(is_weak_token("1234567890123456789"));
        assert!(is_weak_token("aaaaaaaaaaaaaaaaaaaa"));
        assert!(is_weak_token("password-for-the-bridge"));
        assert!(!is_weak_token("k7Qm2xVw9pLr4tYz8nBc"));
    }

    #[test]
    fn constant_time_compare() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
