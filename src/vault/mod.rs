// Opsvault: Vault Module
//
// The reveal workflow: the only path by which a plaintext secret leaves
// the vault.

mod reveal;

pub use reveal::RevealWorkflow;
