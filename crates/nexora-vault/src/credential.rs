//! The persisted record of an established provider connection.
//!
//! Logical shape, as stored:
//!
//! ```json
//! {
//!   "status": "connected",
//!   "token": "<ivHex>:<cipherHex>",
//!   "connectedAt": "2024-01-01T00:00:00Z",
//!   "...": "provider-specific metadata"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, VaultError};

/// Connection state of a (user, provider) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// A credential is stored for the pair.
    Connected,
    /// No credential is stored for the pair.
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored provider connection for one user.
///
/// `token` is always ciphertext produced by
/// [`TokenCipher::encrypt`](crate::cipher::TokenCipher::encrypt); the
/// plaintext access token never appears in this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub status: ConnectionStatus,

    /// Encrypted access token in `ivHex:cipherHex` form.
    pub token: String,

    pub connected_at: DateTime<Utc>,

    /// Vendor metadata returned with the token (scope, team id, ...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Credential {
    /// A freshly connected credential stamped with the current time.
    pub fn connected(token: String, metadata: Map<String, Value>) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            token,
            connected_at: Utc::now(),
            metadata,
        }
    }

    /// Flatten into the document form handed to a store.
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(VaultError::Internal(
                "credential did not serialize to an object".into(),
            )),
        }
    }

    /// Rebuild from a stored document.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// Merge `incoming` into `existing`: incoming keys win, other existing keys
/// are kept.
pub fn merge_fields(existing: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}
