//! The opaque `state` value carried through the OAuth redirect.
//!
//! The state binds a callback to the user and provider that started the
//! flow.  Wire form:
//!
//! ```text
//! unsigned:  BASE64URL(json)
//! signed:    BASE64URL(json) "." BASE64URL(HMAC-SHA256(secret, BASE64URL(json)))
//! ```
//!
//! where `json` is `{"userId": "...", "provider": "..."}`.  Signing is
//! enabled by configuring a state secret; once enabled, unsigned or
//! tampered values are rejected.  Decoding also accepts standard padded
//! base64 so states minted by older deployments still resolve.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::{AuthEngineError, Result};

/// Separator between payload and signature.
const SIGNATURE_SEPARATOR: char = '.';

/// The data round-tripped through the vendor redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    #[serde(rename = "userId")]
    pub user_id: String,

    #[serde(rename = "provider")]
    pub provider_id: String,
}

impl OAuthState {
    pub fn new(user_id: &str, provider_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            provider_id: provider_id.to_string(),
        }
    }
}

/// Encodes and decodes [`OAuthState`] values.
pub struct StateCodec {
    key: Option<hmac::Key>,
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec")
            .field("signed", &self.is_signed())
            .finish()
    }
}

impl StateCodec {
    /// A codec producing plain base64url states.
    pub fn unsigned() -> Self {
        Self { key: None }
    }

    /// A codec that HMAC-signs states with `secret` and verifies on decode.
    pub fn signed(secret: &[u8]) -> Self {
        Self {
            key: Some(hmac::Key::new(hmac::HMAC_SHA256, secret)),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.key.is_some()
    }

    /// Serialize `state` into its URL-safe wire form.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::InvalidState`] if the state has an empty
    /// user or provider id.
    pub fn encode(&self, state: &OAuthState) -> Result<String> {
        validate(state)?;

        let json = serde_json::to_vec(state).map_err(|e| invalid(format!("serialize: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        Ok(match &self.key {
            Some(key) => {
                let tag = hmac::sign(key, payload.as_bytes());
                format!(
                    "{payload}{SIGNATURE_SEPARATOR}{}",
                    URL_SAFE_NO_PAD.encode(tag.as_ref())
                )
            }
            None => payload,
        })
    }

    /// Parse a wire-form state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::InvalidState`] if `raw` is empty, is not
    /// valid base64, fails signature verification, or does not decode to a
    /// `{userId, provider}` pair with non-empty values.
    pub fn decode(&self, raw: &str) -> Result<OAuthState> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid("state is missing"));
        }

        let payload = match &self.key {
            Some(key) => {
                let (payload, signature) = raw
                    .split_once(SIGNATURE_SEPARATOR)
                    .ok_or_else(|| invalid("state is not signed"))?;
                let signature = URL_SAFE_NO_PAD
                    .decode(signature)
                    .map_err(|_| invalid("signature is not valid base64"))?;
                hmac::verify(key, payload.as_bytes(), &signature)
                    .map_err(|_| invalid("signature mismatch"))?;
                payload
            }
            None => raw,
        };

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD.decode(payload))
            .map_err(|_| invalid("state is not valid base64"))?;

        let state: OAuthState =
            serde_json::from_slice(&json).map_err(|e| invalid(format!("unexpected shape: {e}")))?;
        validate(&state)?;
        Ok(state)
    }
}

fn validate(state: &OAuthState) -> Result<()> {
    if state.user_id.is_empty() {
        return Err(invalid("user id is empty"));
    }
    if state.provider_id.is_empty() {
        return Err(invalid("provider id is empty"));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> AuthEngineError {
    AuthEngineError::InvalidState {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
