// Opsvault: CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, system, add, list, show, update, delete, reveal, audit, serve.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

pub use commands::execute;

/// Opsvault: an audited vault for operational login secrets.
#[derive(Parser, Debug)]
#[command(name = "opsvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Identity recorded in the audit log for this invocation.
    #[arg(long, global = true, default_value = "opsvault-cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize opsvault: create the application secret and the database.
    Init,

    /// Manage the systems credentials belong to.
    #[command(subcommand)]
    System(SystemCommands),

    /// Store a new credential under a system.
    Add {
        /// The system this credential logs into.
        #[arg(long)]
        system: Uuid,

        /// Login name or account identifier.
        #[arg(long)]
        login: String,

        /// The secret. Read from stdin when omitted, to keep it out of shell history.
        #[arg(long)]
        secret: Option<String>,

        /// PRODUCTION, STAGING or DEVELOPMENT.
        #[arg(long, default_value = "DEVELOPMENT")]
        environment: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Id of the person this account belongs to.
        #[arg(long)]
        reference_user_id: Option<String>,

        /// Name of the person this account belongs to.
        #[arg(long)]
        reference_user_name: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List the active credentials of a system (metadata only, no secrets).
    List {
        #[arg(long)]
        system: Uuid,
    },

    /// Show the details of a credential (no secret).
    Show { id: Uuid },

    /// Update credential metadata, optionally rotating the secret.
    Update {
        id: Uuid,

        #[arg(long)]
        login: Option<String>,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Empty string clears the value.
        #[arg(long)]
        reference_user_id: Option<String>,

        /// Empty string clears the value.
        #[arg(long)]
        reference_user_name: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Rotate the secret, reading the new value from stdin.
        #[arg(long, default_value = "false")]
        rotate: bool,
    },

    /// Soft-delete a credential. Its audit history is kept.
    Delete { id: Uuid },

    /// Print the plaintext secret of a credential. Always audited.
    Reveal { id: Uuid },

    /// View the audit log for a credential, newest first.
    Audit { id: Uuid },

    /// Start the JSON-RPC gateway on a Unix domain socket.
    Serve {
        /// Socket path; overrides OPSVAULT_SOCKET.
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Register a new system.
    Add { name: String },

    /// List registered systems.
    List,

    /// Deactivate a system. No new credentials can be added to it.
    Deactivate { id: Uuid },
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_actor_defaults_and_is_global() {
        let cli = Cli::try_parse_from(["opsvault", "system", "list"]).unwrap();
        assert_eq!(cli.actor, "opsvault-cli");

        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["opsvault", "reveal", &id, "--actor", "alice"]).unwrap();
        assert_eq!(cli.actor, "alice");
        assert!(matches!(cli.command, Commands::Reveal { .. }));
    }

    #[test]
    fn test_add_parses_fields() {
        let system = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "opsvault",
            "add",
            "--system",
            &system.to_string(),
            "--login",
            "svc_billing",
            "--environment",
            "prod",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                system: parsed,
                login,
                secret,
                environment,
                ..
            } => {
                assert_eq!(parsed, system);
                assert_eq!(login, "svc_billing");
                assert!(secret.is_none());
                assert_eq!(environment, "prod");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_uuid_is_rejected() {
        assert!(Cli::try_parse_from(["opsvault", "show", "not-a-uuid"]).is_err());
    }
}
