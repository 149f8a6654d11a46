// Opsvault: Crypto Module
//
// AES-256-GCM sealing of credential secrets, key derivation from the
// application secret, and the sources that application secret is loaded from.

mod cipher;
mod error;
mod key;
mod secret_source;

pub use cipher::{decrypt, encrypt, CipherBlob, AUTH_TAG_LEN, IV_LEN};
pub use error::{CipherError, KeyError};
pub use key::{derive_key, CipherKey, DerivedKeyProvider, Kdf, KeyProvider, KEY_LEN};
pub use secret_source::{AppSecretSource, EnvSecretSource, KeyringSecretSource};
