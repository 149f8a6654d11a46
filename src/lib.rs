// Opsvault: Library root
//
// Credentials are sealed by `crypto`, persisted with their audit trail by
// `store`, and opened again only through `vault::RevealWorkflow`. The CLI and
// the socket gateway are thin callers of those three.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod store;
pub mod vault;

pub use error::{Result, VaultError};
