//! SQLite schema DDL and catalog initialization.

use rusqlite::{Connection, Error as SqliteError, ErrorCode};

/// SQLite schema version supported by this build.
pub const TARGET_SCHEMA_VERSION: i64 = 1;

/// Packed SQL definition for the complete catalog schema.
pub const LIBRARY_SCHEMA_SQL: &str = include_str!("../../schema/library_schema.sql");

/// Apply the schema (or upgrade an existing catalog) on the provided connection.
///
/// Enforces WAL journaling and foreign keys, runs any pending migrations,
/// and keeps `PRAGMA user_version` aligned with [`TARGET_SCHEMA_VERSION`].
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    // In-memory databases report "memory" and ignore WAL.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version > TARGET_SCHEMA_VERSION {
        return Err(newer_schema_error(user_version));
    }
    if user_version < TARGET_SCHEMA_VERSION {
        apply_migrations(conn, user_version)?;
    }

    conn.pragma_update(None, "user_version", TARGET_SCHEMA_VERSION)?;
    Ok(())
}

fn apply_migrations(conn: &Connection, from_version: i64) -> rusqlite::Result<()> {
    match from_version {
        0 => conn.execute_batch(LIBRARY_SCHEMA_SQL),
        _ => Err(newer_schema_error(from_version)),
    }
}

fn newer_schema_error(version: i64) -> SqliteError {
    SqliteError::SqliteFailure(
        rusqlite::ffi::Error {
            code: ErrorCode::DatabaseCorrupt,
            extended_code: 0,
        },
        Some(format!(
            "catalog schema version {version} is newer than supported {TARGET_SCHEMA_VERSION}"
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_sets_version_and_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, TARGET_SCHEMA_VERSION);

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(initialize_schema(&conn).is_err());
    }

    #[test]
    fn test_tag_name_source_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        let insert = "INSERT INTO tags (name, source, created_at) VALUES (?1, ?2, 'now')";
        conn.execute(insert, ["cat", "custom"]).unwrap();
        conn.execute(insert, ["cat", "exif"]).unwrap();
        assert!(conn.execute(insert, ["cat", "custom"]).is_err());
    }
}
