// Opsvault: Gateway Module
//
// Unix Domain Socket (UDS) server exposing the vault operations as
// JSON-RPC 2.0 to the authenticated front-end.

mod protocol;
mod uds;

pub use uds::{Backend, UdsServer};
