use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Brings the schema up to date.
///
/// The meta-bot and every generated bot call this on the same database file.
/// Runs are serialized within a process by a mutex. Across processes each
/// statement waits up to the busy timeout for another writer's lock, and a
/// run that still fails is retried once against the now-current history.
///
/// Refinery opens its own transaction per migration, so the run must not be
/// wrapped in an outer `BEGIN`.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    // Migrations are idempotent, a poisoned lock is safe to reuse
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(Duration::from_secs(30))
        .context("set SQLite busy timeout")?;

    let report = match embedded::migrations::runner().run(conn) {
        Ok(report) => report,
        Err(e) => {
            // Another process may have applied the same version first
            log::warn!("Migration run failed ({}), retrying once", e);
            embedded::migrations::runner()
                .run(conn)
                .context("apply migrations")?
        }
    };

    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn test_migrations_create_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        let tables = table_names(&conn);
        for expected in ["bot_configs", "poll_responses", "polls", "users"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[test]
    fn test_migrations_refuse_an_outer_transaction() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        assert!(run_migrations(&mut conn).is_err());

        conn.execute_batch("ROLLBACK").unwrap();
        run_migrations(&mut conn).unwrap();
    }

    #[test]
    fn test_migrations_shared_file_from_two_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_users.db");
        let mut first = Connection::open(&path).unwrap();
        let mut second = Connection::open(&path).unwrap();

        run_migrations(&mut first).unwrap();
        run_migrations(&mut second).unwrap();
        assert_eq!(table_names(&first), table_names(&second));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
    }
}
