use rusqlite::Connection;

use relay_shared::ThreadSummary;

use super::now_millis;

fn row_to_thread(row: &rusqlite::Row) -> rusqlite::Result<ThreadSummary> {
    Ok(ThreadSummary {
        id: row.get("id")?,
        title: row.get("title")?,
    })
}

/// Insert a thread or rename an existing one. Either way it moves to the
/// top of the listing.
pub fn upsert_thread(conn: &Connection, id: &str, title: &str) -> anyhow::Result<ThreadSummary> {
    let now = now_millis();
    conn.execute(
        "INSERT INTO threads (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(id) DO UPDATE SET title = excluded.title, updated_at = excluded.updated_at",
        rusqlite::params![id, title, now],
    )?;
    get_thread(conn, id).ok_or_else(|| anyhow::anyhow!("failed to upsert thread {id}"))
}

pub fn get_thread(conn: &Connection, id: &str) -> Option<ThreadSummary> {
    conn.prepare("SELECT id, title FROM threads WHERE id = ?1")
        .ok()?
        .query_row(rusqlite::params![id], row_to_thread)
        .ok()
}

/// Most recently active threads first.
pub fn list_threads(conn: &Connection, limit: usize) -> Vec<ThreadSummary> {
    let mut stmt = match conn
        .prepare("SELECT id, title FROM threads ORDER BY updated_at DESC, rowid DESC LIMIT ?1")
    {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    stmt.query_map(rusqlite::params![limit as i64], row_to_thread)
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
}

pub fn touch_thread(conn: &Connection, id: &str) -> bool {
    let result = conn.execute(
        "UPDATE threads SET updated_at = ?2 WHERE id = ?1",
        rusqlite::params![id, now_millis()],
    );
    matches!(result, Ok(n) if n > 0)
}

pub fn delete_thread(conn: &Connection, id: &str) -> bool {
    let result = conn.execute("DELETE FROM threads WHERE id = ?1", rusqlite::params![id]);
    matches!(result, Ok(n) if n > 0)
}
