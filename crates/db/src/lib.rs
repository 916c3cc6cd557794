//! SQLite connection handling and schema migrations for shelf.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::Connection;
use shelf_kernel::Migration;
use thiserror::Error;

/// Errors raised by the database layer
#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Shared handle to a single SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::info!(target: "shelf-db", path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply every migration not yet recorded in `__schema_migrations`.
    ///
    /// Each migration runs in its own transaction and is recorded as
    /// `module:id`. Returns the number of migrations applied.
    pub async fn migrate(&self, migrations: Vec<(String, Migration)>) -> Result<usize, DbError> {
        self.call(move |conn| run_migrations(conn, &migrations)).await
    }

    /// Run `f` against the connection on the blocking thread pool.
    ///
    /// A panic in an earlier closure poisons the lock; the connection is still
    /// usable afterwards since an open transaction rolls back when dropped.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| {
                tracing::warn!(target: "shelf-db", "recovering poisoned connection lock");
                PoisonError::into_inner(poisoned)
            });
            f(&mut guard)
        })
        .await
        .map_err(|err| E::from(DbError::Join(err)))?;

        result
    }
}

fn run_migrations(
    conn: &mut Connection,
    migrations: &[(String, Migration)],
) -> Result<usize, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS __schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let version = format!("{}:{}", module, migration.id);

        let already_applied = {
            let mut stmt = conn.prepare("SELECT 1 FROM __schema_migrations WHERE version = ?1")?;
            stmt.exists([&version])?
        };

        if already_applied {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(migration.up)?;
        tx.execute(
            "INSERT INTO __schema_migrations (version) VALUES (?1)",
            (&version,),
        )?;
        tx.commit()?;

        tracing::info!(target: "shelf-db", %version, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "notes".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.migrate(migrations()).await.unwrap(), 1);
        assert_eq!(db.migrate(migrations()).await.unwrap(), 0);

        let recorded: String = db
            .call(|conn| {
                conn.query_row("SELECT version FROM __schema_migrations", [], |row| {
                    row.get(0)
                })
                .map_err(DbError::from)
            })
            .await
            .unwrap();
        assert_eq!(recorded, "notes:001_init");
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::open_in_memory().unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE oops (;",
            },
        )];

        assert!(matches!(db.migrate(broken).await, Err(DbError::Sqlite(_))));

        let count: i64 = db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM __schema_migrations", [], |row| {
                    row.get(0)
                })
                .map_err(DbError::from)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn connection_survives_a_panicking_call() {
        let db = Database::open_in_memory().unwrap();
        db.migrate(migrations()).await.unwrap();

        let panicked = db
            .call(|conn| -> Result<(), DbError> {
                conn.execute("INSERT INTO notes (body) VALUES ('before')", [])?;
                panic!("handler bug");
            })
            .await;
        assert!(matches!(panicked, Err(DbError::Join(_))));

        let count: i64 = db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
                    .map_err(DbError::from)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let path = std::env::temp_dir().join(format!("shelf-db-{}.db", std::process::id()));
        let db = Database::open(&path).unwrap();
        db.migrate(migrations()).await.unwrap();
        assert!(path.exists());

        drop(db);
        std::fs::remove_file(&path).ok();
    }
}
