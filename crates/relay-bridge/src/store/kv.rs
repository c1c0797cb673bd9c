use rusqlite::Connection;

use super::now_millis;

pub fn get(conn: &Connection, key: &str) -> Option<String> {
    conn.prepare("SELECT value FROM kv WHERE key = ?1")
        .ok()?
        .query_row(rusqlite::params![key], |row| row.get(0))
        .ok()
}

pub fn set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, value, now_millis()],
    )?;
    Ok(())
}

pub fn remove(conn: &Connection, key: &str) -> bool {
    let result = conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key]);
    matches!(result, Ok(n) if n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn set_get_remove() {
        let store = Store::new_in_memory().unwrap();
        let conn = &store.conn();
        assert!(get(conn, "telegram.selectedThreadId").is_none());

        set(conn, "telegram.selectedThreadId", "t1").unwrap();
        set(conn, "telegram.selectedThreadId", "t2").unwrap();
        assert_eq!(get(conn, "telegram.selectedThreadId").as_deref(), Some("t2"));

        assert!(remove(conn, "telegram.selectedThreadId"));
        assert!(!remove(conn, "telegram.selectedThreadId"));
        assert!(get(conn, "telegram.selectedThreadId").is_none());
    }
}
