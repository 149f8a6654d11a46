// Opsvault: Application Secret Sources
//
// The application secret is the input to key derivation. Production
// deployments inject it through an environment variable; single-host
// installs keep it in the platform keyring, where `opsvault init` creates
// it on first run.

use rand::RngCore;
use zeroize::Zeroizing;

use super::KeyError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Service name used to identify opsvault entries in the platform keyring.
const KEYRING_SERVICE: &str = "opsvault-credential-vault";

/// Username for the keyring entry.
const KEYRING_USER: &str = "application-secret";

/// Random bytes in a generated application secret (hex encoded when stored).
const GENERATED_SECRET_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Somewhere the long-lived application secret lives.
pub trait AppSecretSource {
    /// Load the application secret, creating one if this source supports it.
    fn load_or_create(&self) -> Result<Zeroizing<String>, KeyError>;

    /// Whether a secret is currently available.
    fn has_secret(&self) -> Result<bool, KeyError>;
}

fn generate_secret() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; GENERATED_SECRET_LEN]);
    rand::rng().fill_bytes(bytes.as_mut_slice());
    Zeroizing::new(hex::encode(bytes.as_slice()))
}

// ─── Environment ─────────────────────────────────────────────────────────────

/// Reads the secret from an environment variable. Never creates one.
pub struct EnvSecretSource {
    var: String,
}

impl EnvSecretSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    fn read(&self) -> Option<Zeroizing<String>> {
        std::env::var(&self.var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Zeroizing::new)
    }
}

impl AppSecretSource for EnvSecretSource {
    fn load_or_create(&self) -> Result<Zeroizing<String>, KeyError> {
        self.read().ok_or(KeyError::SecretNotFound)
    }

    fn has_secret(&self) -> Result<bool, KeyError> {
        Ok(self.read().is_some())
    }
}

// ─── Platform Keyring ────────────────────────────────────────────────────────

/// Keeps the secret in the platform keyring via the `keyring` crate:
///   - Linux: kernel keyutils
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringSecretSource {
    service: String,
    user: String,
}

impl KeyringSecretSource {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| KeyError::Keyring(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringSecretSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppSecretSource for KeyringSecretSource {
    fn load_or_create(&self) -> Result<Zeroizing<String>, KeyError> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved application secret from keyring");
                Ok(Zeroizing::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!("No application secret found, generating a new one");
                let secret = generate_secret();
                entry.set_password(&secret).map_err(|e| {
                    KeyError::Keyring(format!("failed to store application secret: {}", e))
                })?;
                tracing::info!("Application secret stored in platform keyring");
                Ok(secret)
            }
            Err(e) => Err(KeyError::Keyring(format!(
                "failed to retrieve application secret: {}",
                e
            ))),
        }
    }

    fn has_secret(&self) -> Result<bool, KeyError> {
        match self.entry()?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(KeyError::Keyring(format!(
                "failed to check application secret: {}",
                e
            ))),
        }
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps the secret in memory so tests never touch the real keyring.
    pub struct MemorySecretSource {
        secret: Mutex<Option<String>>,
    }

    impl MemorySecretSource {
        pub fn new() -> Self {
            Self {
                secret: Mutex::new(None),
            }
        }
    }

    impl AppSecretSource for MemorySecretSource {
        fn load_or_create(&self) -> Result<Zeroizing<String>, KeyError> {
            let mut guard = self.secret.lock().unwrap();
            let secret = guard.get_or_insert_with(|| generate_secret().to_string());
            Ok(Zeroizing::new(secret.clone()))
        }

        fn has_secret(&self) -> Result<bool, KeyError> {
            Ok(self.secret.lock().unwrap().is_some())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MemorySecretSource;
    use super::*;

    #[test]
    fn test_generated_secret_is_hex_of_expected_length() {
        let secret = generate_secret();
        assert_eq!(secret.len(), GENERATED_SECRET_LEN * 2);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret().as_str(), generate_secret().as_str());
    }

    #[test]
    fn test_secret_is_stable_once_created() {
        let source = MemorySecretSource::new();
        let first = source.load_or_create().unwrap();
        let second = source.load_or_create().unwrap();
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn test_has_secret_after_first_load() {
        let source = MemorySecretSource::new();
        assert!(!source.has_secret().unwrap());

        source.load_or_create().unwrap();
        assert!(source.has_secret().unwrap());
    }

    #[test]
    fn test_env_source_missing_variable() {
        let source = EnvSecretSource::new("OPSVAULT_TEST_SECRET_THAT_IS_NEVER_SET");
        assert!(!source.has_secret().unwrap());
        assert!(matches!(
            source.load_or_create(),
            Err(KeyError::SecretNotFound)
        ));
    }

    #[test]
    fn test_env_source_reads_variable() {
        let var = "OPSVAULT_TEST_SECRET_ENV_SOURCE";
        std::env::set_var(var, "from-the-environment");
        let source = EnvSecretSource::new(var);
        assert!(source.has_secret().unwrap());
        assert_eq!(source.load_or_create().unwrap().as_str(), "from-the-environment");
        std::env::remove_var(var);
    }
}
