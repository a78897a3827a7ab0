//! Error types for the auth engine crate.
//!
//! All auth engine operations surface errors through [`AuthEngineError`],
//! which is the single error type for this crate. Variants that carry a
//! vendor message display that message verbatim so it can be shown to the
//! user unchanged.

use nexora_vault::VaultError;

/// Unified error type for the Nexora auth engine.
#[derive(Debug, thiserror::Error)]
pub enum AuthEngineError {
    /// The requested provider is not registered.
    #[error("provider not found: {provider}")]
    ProviderNotFound {
        /// The provider id that was not found.
        provider: String,
    },

    /// The caller's bearer token is missing or not recognised.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why the token was rejected.
        reason: String,
    },

    /// The callback `state` is missing, malformed, forged, or was issued for
    /// another provider.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// What is wrong with the state value.
        reason: String,
    },

    /// The vendor rejected the authorization code exchange.
    #[error("{reason}")]
    OAuthExchangeFailed {
        /// The provider that rejected the exchange.
        provider: String,
        /// The vendor's message, preserved as-is.
        reason: String,
    },

    /// The vendor listing call failed.
    #[error("{reason}")]
    ProjectFetchFailed {
        /// The provider whose listing failed.
        provider: String,
        /// The vendor's message, or a generic description.
        reason: String,
    },

    /// The stored token could not be decrypted.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Details from the cipher.
        reason: String,
    },

    /// Projects were requested for a provider the user has not connected.
    #[error("Not connected")]
    NotConnected {
        /// The provider with no stored credential.
        provider: String,
    },

    /// A provider was registered without implementing a capability.
    #[error("{provider} does not implement {capability}")]
    NotImplemented {
        /// The misconfigured provider.
        provider: String,
        /// The missing capability.
        capability: &'static str,
    },

    /// A vendor endpoint timed out or refused the connection.
    #[error("{provider} is unreachable: {reason}")]
    ProviderUnreachable {
        /// The provider that could not be reached.
        provider: String,
        /// Transport-level detail.
        reason: String,
    },

    /// The credential store failed.
    #[error("storage error: {0}")]
    Storage(VaultError),

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl From<VaultError> for AuthEngineError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::DecryptionFailed { reason } => Self::DecryptionFailed { reason },
            other => Self::Storage(other),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthEngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_display_is_user_facing() {
        let err = AuthEngineError::NotConnected {
            provider: "github".into(),
        };
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn exchange_failure_displays_vendor_message() {
        let err = AuthEngineError::OAuthExchangeFailed {
            provider: "github".into(),
            reason: "bad_verification_code".into(),
        };
        assert_eq!(err.to_string(), "bad_verification_code");
    }

    #[test]
    fn error_display_provider_not_found() {
        let err = AuthEngineError::ProviderNotFound {
            provider: "linear".into(),
        };
        assert_eq!(err.to_string(), "provider not found: linear");
    }

    #[test]
    fn not_implemented_names_capability() {
        let err = AuthEngineError::NotImplemented {
            provider: "custom".into(),
            capability: "list_projects",
        };
        assert_eq!(err.to_string(), "custom does not implement list_projects");
    }

    #[test]
    fn vault_decryption_failure_maps_to_decryption_failed() {
        let err: AuthEngineError = VaultError::DecryptionFailed {
            reason: "missing IV separator".into(),
        }
        .into();
        assert!(matches!(err, AuthEngineError::DecryptionFailed { .. }));

        let err: AuthEngineError = VaultError::Internal("boom".into()).into();
        assert!(matches!(err, AuthEngineError::Storage(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthEngineError>();
    }
}
