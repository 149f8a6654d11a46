// Opsvault: Key Derivation
//
// The whole vault runs under one 256-bit key, derived from the long-lived
// application secret with a memory-hard KDF and a fixed salt. The derived
// key is computed once at startup and handed to the store and the reveal
// workflow through `KeyProvider`.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::KeyError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Fixed KDF salt. One salt for every installation, so the same application
/// secret always yields the same key.
const KDF_SALT: &[u8] = b"opsvault::credential-vault::v1";

// scrypt cost: N = 2^14, r = 8, p = 1 (16 MiB per derivation).
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

// Argon2id cost: m = 64 MiB, t = 3, p = 4.
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

// ─── Key ─────────────────────────────────────────────────────────────────────

/// A 256-bit symmetric key. Wiped on drop and never printed.
pub struct CipherKey(Zeroizing<[u8; KEY_LEN]>);

impl CipherKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

// ─── KDF ─────────────────────────────────────────────────────────────────────

/// Key derivation function used to turn the application secret into a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kdf {
    #[default]
    Scrypt,
    Argon2id,
}

impl Kdf {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kdf::Scrypt => "scrypt",
            Kdf::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for Kdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kdf {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrypt" => Ok(Kdf::Scrypt),
            "argon2id" | "argon2" => Ok(Kdf::Argon2id),
            other => Err(format!("unknown KDF '{}', expected scrypt or argon2id", other)),
        }
    }
}

/// Derive the vault key from `secret`.
///
/// Deterministic for a given (secret, kdf) pair. Slow by construction, so
/// callers should derive once and keep the result in a `KeyProvider`.
pub fn derive_key(secret: &[u8], kdf: Kdf) -> Result<CipherKey, KeyError> {
    if secret.is_empty() {
        return Err(KeyError::EmptySecret);
    }

    let mut derived = Zeroizing::new([0u8; KEY_LEN]);

    match kdf {
        Kdf::Scrypt => {
            let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
                .map_err(|e| KeyError::Derivation(format!("invalid scrypt params: {}", e)))?;
            scrypt::scrypt(secret, KDF_SALT, &params, derived.as_mut_slice())
                .map_err(|e| KeyError::Derivation(format!("scrypt failed: {}", e)))?;
        }
        Kdf::Argon2id => {
            let params =
                Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(KEY_LEN))
                    .map_err(|e| KeyError::Derivation(format!("invalid Argon2 params: {}", e)))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(secret, KDF_SALT, derived.as_mut_slice())
                .map_err(|e| KeyError::Derivation(format!("Argon2id hash failed: {}", e)))?;
        }
    }

    Ok(CipherKey(derived))
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// Supplies the vault key to the components that seal and open secrets.
pub trait KeyProvider {
    fn cipher_key(&self) -> &CipherKey;
}

/// Holds a key derived once at process start.
#[derive(Debug)]
pub struct DerivedKeyProvider {
    key: CipherKey,
    kdf: Kdf,
}

impl DerivedKeyProvider {
    pub fn derive(secret: &[u8], kdf: Kdf) -> Result<Self, KeyError> {
        let key = derive_key(secret, kdf)?;
        tracing::debug!(kdf = %kdf, "Vault key derived");
        Ok(Self { key, kdf })
    }

    /// Wrap an already-derived key.
    pub fn from_key(key: CipherKey, kdf: Kdf) -> Self {
        Self { key, kdf }
    }

    pub fn kdf(&self) -> Kdf {
        self.kdf
    }
}

impl KeyProvider for DerivedKeyProvider {
    fn cipher_key(&self) -> &CipherKey {
        &self.key
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrypt_derivation_is_deterministic() {
        let first = derive_key(b"app-secret", Kdf::Scrypt).unwrap();
        let second = derive_key(b"app-secret", Kdf::Scrypt).unwrap();
        assert_eq!(
            first.as_bytes(),
            second.as_bytes(),
            "Same secret must produce the same key"
        );
    }

    #[test]
    fn test_different_secrets_produce_different_keys() {
        let a = derive_key(b"secret-a", Kdf::Scrypt).unwrap();
        let b = derive_key(b"secret-b", Kdf::Scrypt).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_kdfs_produce_different_keys() {
        let scrypt = derive_key(b"app-secret", Kdf::Scrypt).unwrap();
        let argon = derive_key(b"app-secret", Kdf::Argon2id).unwrap();
        assert_ne!(scrypt.as_bytes(), argon.as_bytes());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(
            derive_key(b"", Kdf::Scrypt),
            Err(KeyError::EmptySecret)
        ));
    }

    #[test]
    fn test_derived_key_length() {
        let key = derive_key(b"app-secret", Kdf::Scrypt).unwrap();
        assert_eq!(key.as_bytes().len(), KEY_LEN);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = CipherKey::from_bytes([0xAB; KEY_LEN]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.to_lowercase().contains("ab, ab"));
        assert!(!debug.contains("171"));
    }

    #[test]
    fn test_provider_returns_derived_key() {
        let provider = DerivedKeyProvider::derive(b"app-secret", Kdf::Scrypt).unwrap();
        let direct = derive_key(b"app-secret", Kdf::Scrypt).unwrap();
        assert_eq!(provider.cipher_key().as_bytes(), direct.as_bytes());
        assert_eq!(provider.kdf(), Kdf::Scrypt);
    }

    #[test]
    fn test_kdf_parse() {
        assert_eq!("scrypt".parse::<Kdf>().unwrap(), Kdf::Scrypt);
        assert_eq!("Argon2id".parse::<Kdf>().unwrap(), Kdf::Argon2id);
        assert_eq!(" argon2 ".parse::<Kdf>().unwrap(), Kdf::Argon2id);
        assert!("pbkdf2".parse::<Kdf>().is_err());
        assert_eq!(Kdf::default(), Kdf::Scrypt);
    }
}
