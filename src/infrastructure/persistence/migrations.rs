use rusqlite::Connection;

/// Initialize the database schema, creating tables if they don't exist.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS device_preferences (
            key         TEXT    PRIMARY KEY,
            value       TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS dispatch_log (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            dispatched_at    TEXT    NOT NULL,
            source           TEXT    NOT NULL,
            overall_success  INTEGER NOT NULL,
            data             TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dispatch_log_dispatched_at ON dispatch_log(dispatched_at);",
    )?;
    Ok(())
}
