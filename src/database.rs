use rusqlite::{Connection, OptionalExtension, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(database_url).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
            info!(dir = %parent.display(), "📁 ensured cache directory");
        }
    }
    Ok(())
}

pub fn create_database_with_connection(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cache_blobs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

pub fn put_blob(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO cache_blobs (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value),
    )?;
    Ok(())
}

pub fn get_blob(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM cache_blobs WHERE key = ?1")?;
    stmt.query_row([key], |row| row.get::<_, String>(0)).optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_upsert_and_read() {
        let conn = Connection::open_in_memory().unwrap();
        create_database_with_connection(&conn).unwrap();

        assert_eq!(get_blob(&conn, "k").unwrap(), None);
        put_blob(&conn, "k", "one").unwrap();
        put_blob(&conn, "k", "two").unwrap();
        assert_eq!(get_blob(&conn, "k").unwrap().as_deref(), Some("two"));
    }
}
