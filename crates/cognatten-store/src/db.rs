//! Connection bootstrap and schema migrations.
//!
//! Migration version is tracked via `PRAGMA user_version`; application
//! code must not touch the tables before migrations succeed. Returned
//! connections have `foreign_keys = ON` so deleting a student cascades
//! to their attendance rows.

use crate::StoreError;
use rusqlite::Connection;
use std::time::Duration;

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
        CREATE TABLE IF NOT EXISTS students (
            id      TEXT PRIMARY KEY,
            name    TEXT NOT NULL,
            faculty TEXT,
            dob     TEXT,
            email   TEXT,
            address TEXT
        );
        CREATE TABLE IF NOT EXISTS attendance (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            date       TEXT NOT NULL,
            time       TEXT NOT NULL,
            FOREIGN KEY (student_id) REFERENCES students (id) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS admins (
            id         TEXT PRIMARY KEY,
            password   TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        INSERT OR IGNORE INTO admins (id, password) VALUES ('admin1', 'admin1');
    ",
}];

/// Configure pragmas and apply pending migrations on a raw connection.
pub fn bootstrap(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        tracing::info!(version = migration.version, "applied schema migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_creates_tables_and_seeds_admin() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"students".to_string()));
        assert!(tables.contains(&"attendance".to_string()));
        assert!(tables.contains(&"admins".to_string()));

        let admins: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM admins WHERE id = 'admin1' AND password = 'admin1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(admins, 1);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();
        bootstrap(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);

        // Re-running must not duplicate the seeded admin
        let admins: i64 = conn
            .query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
            .unwrap();
        assert_eq!(admins, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&mut conn).unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
