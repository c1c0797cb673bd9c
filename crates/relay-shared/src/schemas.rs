//! Thread, message and reply types exchanged between the host and the bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Lenient parse used for stored rows. Anything unknown is `System`.
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::System,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Role::User => "👤",
            Role::Assistant => "🤖",
            Role::System => "⚙️",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub role: Role,
    pub content: Value,
    /// Unix millis.
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    pub content: Value,
}

/// Emitted by the host when the assistant finishes replying in a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub thread_id: String,
    pub response: ReplyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_glyphs() {
        assert_eq!(Role::User.glyph(), "👤");
        assert_eq!(Role::Assistant.glyph(), "🤖");
        assert_eq!(Role::System.glyph(), "⚙️");
    }

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!(Role::parse("assistant"), Role::Assistant);
        assert_eq!(Role::parse("tool"), Role::System);
    }

    #[test]
    fn assistant_reply_uses_camel_case() {
        let reply: AssistantReply = serde_json::from_value(json!({
            "threadId": "t1",
            "response": {"content": "done"}
        }))
        .unwrap();
        assert_eq!(reply.thread_id, "t1");
        assert_eq!(reply.response.content, json!("done"));
    }

    #[test]
    fn message_summary_shape() {
        let msg = MessageSummary {
            id: "m1".into(),
            role: Role::User,
            content: json!("hi"),
            created_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
    }
}
