use rusqlite::Connection;
use serde_json::Value;
use uuid::Uuid;

use relay_shared::{MessageSummary, Role};

use super::{now_millis, threads};

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<MessageSummary> {
    let role: String = row.get("role")?;
    let content: String = row.get("content")?;
    Ok(MessageSummary {
        id: row.get("id")?,
        role: Role::parse(&role),
        content: serde_json::from_str(&content).unwrap_or(Value::String(content)),
        created_at: row.get("created_at")?,
    })
}

fn get_message(conn: &Connection, id: &str) -> Option<MessageSummary> {
    conn.prepare("SELECT * FROM messages WHERE id = ?1")
        .ok()?
        .query_row(rusqlite::params![id], row_to_message)
        .ok()
}

/// Append a message to a thread. A message whose id already exists is
/// returned unchanged, so hosts can safely resend.
pub fn add_message(
    conn: &Connection,
    thread_id: &str,
    id: Option<&str>,
    role: Role,
    content: &Value,
    created_at: Option<i64>,
) -> anyhow::Result<MessageSummary> {
    if let Some(id) = id
        && let Some(existing) = get_message(conn, id)
    {
        return Ok(existing);
    }
    if threads::get_thread(conn, thread_id).is_none() {
        anyhow::bail!("thread {thread_id} not found");
    }

    let id = id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = created_at.unwrap_or_else(now_millis);
    let json = serde_json::to_string(content)?;

    conn.execute(
        "INSERT INTO messages (id, thread_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, thread_id, role.as_str(), json, created_at],
    )?;
    threads::touch_thread(conn, thread_id);

    get_message(conn, &id).ok_or_else(|| anyhow::anyhow!("failed to read back message {id}"))
}

/// All messages of a thread in chronological order.
pub fn get_messages(conn: &Connection, thread_id: &str) -> Vec<MessageSummary> {
    let mut stmt = match conn.prepare(
        "SELECT * FROM messages WHERE thread_id = ?1 ORDER BY created_at ASC, seq ASC",
    ) {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    stmt.query_map(rusqlite::params![thread_id], row_to_message)
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
}
