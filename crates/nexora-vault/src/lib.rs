//! Credential vault for Nexora integrations.
//!
//! This crate owns everything about provider credentials at rest:
//!
//! - [`cipher`]: AES-256-CBC encryption of access tokens into the
//!   self-contained `ivHex:cipherHex` form.
//! - [`credential`]: the persisted [`Credential`] record.
//! - [`store`]: the [`CredentialStore`] trait and an in-memory store.
//! - [`sqlite`]: a durable SQLite-backed store.
//! - [`error`]: Unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nexora_vault::{Credential, CredentialStore, MemoryCredentialStore, TokenCipher};
//!
//! # async fn example() -> nexora_vault::Result<()> {
//! let cipher = TokenCipher::from_config_str(&nexora_vault::cipher::generate_key_hex()?)?;
//! let store = MemoryCredentialStore::new();
//!
//! let token = cipher.encrypt("gho_abc123")?;
//! store
//!     .upsert("user-1", "github", &Credential::connected(token, Default::default()))
//!     .await?;
//!
//! let stored = store.get("user-1", "github").await?.expect("just stored");
//! assert_eq!(cipher.decrypt(&stored.token)?, "gho_abc123");
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod credential;
pub mod error;
pub mod sqlite;
pub mod store;

pub use cipher::TokenCipher;
pub use credential::{ConnectionStatus, Credential};
pub use error::{Result, VaultError};
pub use sqlite::SqliteCredentialStore;
pub use store::{CredentialStore, MemoryCredentialStore};
