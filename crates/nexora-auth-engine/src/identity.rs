//! Caller authentication.
//!
//! Every route except the OAuth callback requires an `Authorization:
//! Bearer <token>` header.  The token is resolved to a user id by an
//! [`IdentityVerifier`].  How tokens are minted is outside this crate; the
//! bundled [`StaticTokenVerifier`] checks against a configured token → user
//! table and suits single-tenant deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use ring::digest;

use crate::error::{AuthEngineError, Result};

/// Resolves a bearer token to the user id it was issued to.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AuthEngineError::Unauthorized`] if the token is not valid.
    async fn verify(&self, bearer_token: &str) -> Result<String>;
}

/// Extract the token from an `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthEngineError::Unauthorized`] if the header is absent, uses a
/// scheme other than `Bearer`, or carries an empty token.
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    let header = header.ok_or_else(|| unauthorized("missing Authorization header"))?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| unauthorized("malformed Authorization header"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(unauthorized("expected a Bearer token"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(unauthorized("empty bearer token"));
    }
    Ok(token)
}

/// Verifier backed by a fixed token table.
///
/// Tokens are held as SHA-256 digests so the plaintext does not stay in
/// memory after construction.
pub struct StaticTokenVerifier {
    users_by_digest: HashMap<Vec<u8>, String>,
}

impl std::fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &self.users_by_digest.len())
            .finish()
    }
}

impl StaticTokenVerifier {
    /// Build from `(token, user_id)` pairs.  Empty tokens are ignored.
    pub fn new<I, T, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: AsRef<str>,
        U: Into<String>,
    {
        let users_by_digest = entries
            .into_iter()
            .filter(|(token, _)| !token.as_ref().is_empty())
            .map(|(token, user)| (fingerprint(token.as_ref()), user.into()))
            .collect();
        Self { users_by_digest }
    }

    pub fn len(&self) -> usize {
        self.users_by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users_by_digest.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<String> {
        self.users_by_digest
            .get(&fingerprint(bearer_token))
            .cloned()
            .ok_or_else(|| unauthorized("unknown token"))
    }
}

fn fingerprint(token: &str) -> Vec<u8> {
    digest::digest(&digest::SHA256, token.as_bytes())
        .as_ref()
        .to_vec()
}

fn unauthorized(reason: &str) -> AuthEngineError {
    AuthEngineError::Unauthorized {
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
