//! SQLite-backed credential store.
//!
//! Each `(user_id, provider)` pair is one row holding the credential as a
//! JSON document.  The token inside the document is already ciphertext, so
//! the database never sees a plaintext access token.
//!
//! The connection sits behind an `Arc<Mutex<>>` and every operation runs on
//! the blocking thread pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE integrations (
//!     user_id    TEXT NOT NULL,
//!     provider   TEXT NOT NULL,
//!     document   TEXT NOT NULL,
//!     updated_at INTEGER NOT NULL,
//!     PRIMARY KEY (user_id, provider)
//! );
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};

use crate::credential::{Credential, merge_fields};
use crate::error::{Result, VaultError};
use crate::store::CredentialStore;

/// A [`CredentialStore`] persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Blocks briefly on file I/O; call during startup.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the file cannot be opened, or
    /// [`VaultError::MigrationFailed`] if schema setup fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening credential database");

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| VaultError::Internal(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| VaultError::Internal(format!("blocking task failed: {e}")))?
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    tracing::debug!("running credential schema migrations");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS integrations (
            user_id    TEXT NOT NULL,
            provider   TEXT NOT NULL,
            document   TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, provider)
        );",
    )
    .map_err(|e| VaultError::MigrationFailed {
        reason: e.to_string(),
    })
}

fn load_document(
    conn: &Connection,
    user_id: &str,
    provider: &str,
) -> Result<Option<Map<String, Value>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT document FROM integrations WHERE user_id = ?1 AND provider = ?2",
            params![user_id, provider],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|text| serde_json::from_str::<Map<String, Value>>(&text))
        .transpose()
        .map_err(VaultError::from)
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<Credential>> {
        let (user_id, provider) = (user_id.to_string(), provider.to_string());
        self.execute(move |conn| {
            load_document(conn, &user_id, &provider)?
                .map(Credential::from_fields)
                .transpose()
        })
        .await
    }

    async fn upsert(&self, user_id: &str, provider: &str, credential: &Credential) -> Result<()> {
        let fields = credential.to_fields()?;
        let (user_id, provider) = (user_id.to_string(), provider.to_string());

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut document = load_document(&tx, &user_id, &provider)?.unwrap_or_default();
            merge_fields(&mut document, fields);

            tx.execute(
                "INSERT INTO integrations (user_id, provider, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, provider)
                 DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
                params![
                    user_id,
                    provider,
                    serde_json::to_string(&document)?,
                    Utc::now().timestamp(),
                ],
            )?;
            tx.commit()?;

            tracing::info!(user_id = %user_id, provider = %provider, "stored credential");
            Ok(())
        })
        .await
    }

    async fn delete(&self, user_id: &str, provider: &str) -> Result<()> {
        let (user_id, provider) = (user_id.to_string(), provider.to_string());
        self.execute(move |conn| {
            let rows = conn.execute(
                "DELETE FROM integrations WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider],
            )?;
            tracing::info!(user_id = %user_id, provider = %provider, rows, "deleted credential");
            Ok(())
        })
        .await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<(String, Credential)>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT provider, document FROM integrations
                 WHERE user_id = ?1 ORDER BY provider",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (provider, text) = row?;
                let fields: Map<String, Value> = serde_json::from_str(&text)?;
                out.push((provider, Credential::from_fields(fields)?));
            }
            Ok(out)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
