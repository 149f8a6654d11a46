// Opsvault: Store Module
//
// SQLite persistence for systems, credentials and the access audit log.
// Secrets arrive here already sealed by the crypto module; the only durable
// form of a secret is its ciphertext blob.

mod audit;
mod credentials;
mod db;
mod error;
mod models;
mod sql;
mod systems;

pub use audit::{AccessAuditLog, SqliteAuditLog};
pub use credentials::{CredentialStore, SqliteCredentialStore};
pub use db::Database;
pub use error::StoreError;
pub use models::{
    AccessContext, AuditAction, AuditLogEntry, CredentialUpdate, CredentialView, Environment,
    NewCredential, System,
};
pub use systems::{SqliteSystemDirectory, SystemDirectory};
