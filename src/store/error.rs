// Opsvault: Store error types
//
// Display strings are what callers see. The cipher and database variants
// keep their detail only as the error source, for logs.

use thiserror::Error;

use crate::crypto::CipherError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unable to process credential")]
    Cipher(#[source] CipherError),

    #[error("Credential storage unavailable")]
    Database(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn credential_not_found(id: &uuid::Uuid) -> Self {
        Self::NotFound {
            entity: "Credential",
            id: id.to_string(),
        }
    }

    pub(crate) fn system_not_found(id: &uuid::Uuid) -> Self {
        Self::NotFound {
            entity: "System",
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        tracing::error!(error = %e, "Storage operation failed");
        Self::Database(e)
    }
}

impl From<CipherError> for StoreError {
    fn from(e: CipherError) -> Self {
        tracing::warn!(error = %e, "Credential cipher operation failed");
        Self::Cipher(e)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_cipher_errors_are_opaque_to_callers() {
        let format = StoreError::from(CipherError::Format("expected 3 segments, found 2".into()));
        let auth = StoreError::from(CipherError::Authentication);

        assert_eq!(format.to_string(), "Unable to process credential");
        assert_eq!(auth.to_string(), "Unable to process credential");
        assert!(!format.to_string().contains("segments"));
    }

    #[test]
    fn test_cipher_detail_kept_as_source() {
        let err = StoreError::from(CipherError::Authentication);
        let source = err.source().expect("cipher error is the source");
        assert_eq!(source.to_string(), "ciphertext failed authentication");
    }

    #[test]
    fn test_database_error_message_is_generic() {
        let err = StoreError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(err.to_string(), "Credential storage unavailable");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_message() {
        let id = uuid::Uuid::nil();
        let err = StoreError::credential_not_found(&id);
        assert_eq!(
            err.to_string(),
            "Credential not found: 00000000-0000-0000-0000-000000000000"
        );
    }
}
