use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn conn(database_url: &str) -> Result<Connection> {
    crate::database::ensure_parent_dir(database_url)
        .with_context(|| format!("Failed to create directory for {database_url}"))?;

    let conn = Connection::open(database_url)
        .with_context(|| format!("Failed to open cache database {database_url}"))?;

    // Initialize the database tables
    crate::database::create_database_with_connection(&conn)?;

    Ok(conn)
}

pub fn in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    crate::database::create_database_with_connection(&conn)?;
    Ok(conn)
}
