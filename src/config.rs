// Opsvault: Configuration
//
// Resolved once at startup from environment variables, with defaults under
// the platform data directory:
//
//   OPSVAULT_DATA_DIR          data directory (default <data_dir>/opsvault)
//   OPSVAULT_DB_PATH           database file (default <data dir>/opsvault.db)
//   OPSVAULT_SOCKET            gateway socket (default $XDG_RUNTIME_DIR/opsvault/opsvault.sock)
//   OPSVAULT_KDF               scrypt | argon2id (default scrypt)
//   OPSVAULT_BUSY_TIMEOUT_MS   storage lock wait in ms (default 5000)
//   OPSVAULT_APP_SECRET_ENV    variable holding the application secret
//                              (default OPSVAULT_APP_SECRET); keyring when unset

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::crypto::{AppSecretSource, EnvSecretSource, Kdf, KeyringSecretSource};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SECRET_ENV: &str = "OPSVAULT_APP_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Where the application secret comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSourceKind {
    /// Read from the named environment variable.
    Env(String),
    /// Platform keyring, created by `opsvault init`.
    Keyring,
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub socket_path: PathBuf,
    pub kdf: Kdf,
    pub busy_timeout: Duration,
    pub secret_source: SecretSourceKind,
}

impl VaultConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve configuration through `lookup`, which returns the value of a
    /// variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let data_dir = get("OPSVAULT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let db_path = get("OPSVAULT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("opsvault.db"));

        let socket_path = get("OPSVAULT_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let runtime_dir = get("XDG_RUNTIME_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"));
                runtime_dir.join("opsvault").join("opsvault.sock")
            });

        let kdf = match get("OPSVAULT_KDF") {
            Some(raw) => raw.parse::<Kdf>().map_err(|reason| ConfigError::Invalid {
                var: "OPSVAULT_KDF",
                reason,
            })?,
            None => Kdf::default(),
        };

        let busy_timeout_ms = match get("OPSVAULT_BUSY_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "OPSVAULT_BUSY_TIMEOUT_MS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BUSY_TIMEOUT_MS,
        };

        let secret_var =
            get("OPSVAULT_APP_SECRET_ENV").unwrap_or_else(|| DEFAULT_SECRET_ENV.to_string());
        let secret_source = if get(&secret_var).is_some() {
            SecretSourceKind::Env(secret_var)
        } else {
            SecretSourceKind::Keyring
        };

        Ok(Self {
            data_dir,
            db_path,
            socket_path,
            kdf,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            secret_source,
        })
    }

    /// Build the configured application secret source.
    pub fn app_secret_source(&self) -> Box<dyn AppSecretSource> {
        match &self.secret_source {
            SecretSourceKind::Env(var) => Box::new(EnvSecretSource::new(var.clone())),
            SecretSourceKind::Keyring => Box::new(KeyringSecretSource::new()),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("opsvault")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
