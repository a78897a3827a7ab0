//! Credential storage collaborator.
//!
//! [`CredentialStore`] is the persistence seam used by the integration
//! manager.  Records are keyed by `(user_id, provider)` and written with
//! merge semantics: an upsert overwrites the fields it carries and keeps
//! any other fields already present.  Concurrent writers to the same key
//! are last-write-wins; no additional locking is offered.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryCredentialStore`]: process-local, for tests and ephemeral runs.
//! - [`SqliteCredentialStore`](crate::sqlite::SqliteCredentialStore):
//!   durable, one JSON document per row.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::credential::{Credential, merge_fields};
use crate::error::Result;

/// Durable storage for per-user provider credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the credential for `(user_id, provider)`, if any.
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<Credential>>;

    /// Merge `credential` into the record for `(user_id, provider)`,
    /// creating it if absent.
    async fn upsert(&self, user_id: &str, provider: &str, credential: &Credential) -> Result<()>;

    /// Remove the record for `(user_id, provider)`.  Removing a record that
    /// does not exist succeeds.
    async fn delete(&self, user_id: &str, provider: &str) -> Result<()>;

    /// All credentials held by `user_id`, as `(provider, credential)` pairs
    /// ordered by provider.
    async fn list(&self, user_id: &str) -> Result<Vec<(String, Credential)>>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

type Key = (String, String);

/// A [`CredentialStore`] backed by a `HashMap` behind an async `RwLock`.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<Key, Map<String, Value>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all users.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<Credential>> {
        let records = self.records.read().await;
        records
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned()
            .map(Credential::from_fields)
            .transpose()
    }

    async fn upsert(&self, user_id: &str, provider: &str, credential: &Credential) -> Result<()> {
        let fields = credential.to_fields()?;
        let mut records = self.records.write().await;
        let entry = records
            .entry((user_id.to_string(), provider.to_string()))
            .or_default();
        merge_fields(entry, fields);

        tracing::debug!(user_id, provider, "upserted credential (memory)");
        Ok(())
    }

    async fn delete(&self, user_id: &str, provider: &str) -> Result<()> {
        let removed = self
            .records
            .write()
            .await
            .remove(&(user_id.to_string(), provider.to_string()))
            .is_some();

        tracing::debug!(user_id, provider, removed, "deleted credential (memory)");
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<(String, Credential)>> {
        let records = self.records.read().await;
        let mut out = records
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|((_, provider), fields)| {
                Ok((provider.clone(), Credential::from_fields(fields.clone())?))
            })
            .collect::<Result<Vec<_>>>()?;
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
