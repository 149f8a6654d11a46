// Opsvault: CLI Command Handlers
//
// Each function handles one CLI subcommand. They load the configuration,
// derive the cipher key from the application secret, and call into the
// store and vault modules. The `serve` command starts the UDS gateway.

use std::io::BufRead;
use std::sync::Arc;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::crypto::DerivedKeyProvider;
use crate::error::VaultError;
use crate::gateway::{Backend, UdsServer};
use crate::store::{
    AccessAuditLog, AccessContext, CredentialStore, CredentialUpdate, CredentialView, Database,
    Environment, NewCredential, SqliteAuditLog, SqliteCredentialStore, SqliteSystemDirectory,
    StoreError,
};
use crate::vault::RevealWorkflow;

use super::{Cli, Commands, SystemCommands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), VaultError> {
    let config = VaultConfig::from_env()?;
    let ctx = AccessContext::new(cli.actor);

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::System(sub) => cmd_system(&config, sub),
        Commands::Add {
            system,
            login,
            secret,
            environment,
            description,
            reference_user_id,
            reference_user_name,
            notes,
        } => {
            let secret = match secret {
                Some(s) => Zeroizing::new(s),
                None => read_secret("Secret")?,
            };
            let credential = NewCredential {
                system_id: system,
                description,
                reference_user_id,
                reference_user_name,
                login,
                secret,
                environment: environment.parse::<Environment>()?,
                notes,
            };
            cmd_add(&config, &ctx, credential)
        }
        Commands::List { system } => cmd_list(&config, &system),
        Commands::Show { id } => cmd_show(&config, &id),
        Commands::Update {
            id,
            login,
            environment,
            description,
            reference_user_id,
            reference_user_name,
            notes,
            rotate,
        } => {
            let update = CredentialUpdate {
                description,
                reference_user_id,
                reference_user_name,
                login,
                environment: environment
                    .map(|e| e.parse::<Environment>())
                    .transpose()?,
                notes,
                new_secret: if rotate {
                    Some(read_secret("New secret")?)
                } else {
                    None
                },
            };
            cmd_update(&config, &ctx, &id, update)
        }
        Commands::Delete { id } => cmd_delete(&config, &ctx, &id),
        Commands::Reveal { id } => cmd_reveal(&config, &ctx, &id),
        Commands::Audit { id } => cmd_audit(&config, &id),
        Commands::Serve { socket } => {
            let socket_path = socket.unwrap_or_else(|| config.socket_path.clone());
            cmd_serve(&config, socket_path).await
        }
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &VaultConfig) -> Result<(), VaultError> {
    std::fs::create_dir_all(&config.data_dir)?;
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Creates the keyring secret on first run; an env source must already be set
    let source = config.app_secret_source();
    let secret = source.load_or_create()?;
    let _keys = DerivedKeyProvider::derive(secret.as_bytes(), config.kdf)?;

    let _db = Database::open(&config.db_path, config.busy_timeout)?;

    println!("✓ Opsvault initialized");
    println!("  Database: {}", config.db_path.display());
    println!("  KDF:      {}", config.kdf);
    println!();
    println!("Next: register a system with `opsvault system add <name>`");

    Ok(())
}

// ─── Systems ─────────────────────────────────────────────────────────────────

fn cmd_system(config: &VaultConfig, command: SystemCommands) -> Result<(), VaultError> {
    let db = open_db(config)?;
    let systems = SqliteSystemDirectory::new(&db);

    match command {
        SystemCommands::Add { name } => {
            let system = systems.register(&name)?;
            println!("✓ System registered");
            println!("  ID:   {}", system.id);
            println!("  Name: {}", system.name);
        }
        SystemCommands::List => {
            let all = systems.list()?;
            if all.is_empty() {
                println!("No systems registered yet.");
                return Ok(());
            }
            for system in &all {
                println!(
                    "  {} │ {:24} │ {}",
                    system.id,
                    system.name,
                    if system.active { "active" } else { "inactive" }
                );
            }
        }
        SystemCommands::Deactivate { id } => {
            if systems.deactivate(&id)? {
                println!("✓ System {} deactivated", id);
            } else {
                return Err(StoreError::system_not_found(&id).into());
            }
        }
    }

    Ok(())
}

// ─── Credentials ─────────────────────────────────────────────────────────────

fn cmd_add(
    config: &VaultConfig,
    ctx: &AccessContext,
    credential: NewCredential,
) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);

    let view = store.create(ctx, credential)?;
    println!("✓ Credential stored");
    println!("  ID:    {}", view.id);
    println!("  Login: {}", view.login);

    Ok(())
}

fn cmd_list(config: &VaultConfig, system_id: &Uuid) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);

    let views = store.list(system_id)?;
    if views.is_empty() {
        println!("No credentials stored for system {}.", system_id);
        return Ok(());
    }

    println!("Credentials ({}):\n", views.len());
    for view in &views {
        println!(
            "  {} │ {:20} │ {:11} │ {}",
            view.id, view.login, view.environment, view.description
        );
    }

    Ok(())
}

fn cmd_show(config: &VaultConfig, id: &Uuid) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);

    let view = store
        .get(id)?
        .ok_or_else(|| StoreError::credential_not_found(id))?;
    print_view(&view);

    Ok(())
}

fn cmd_update(
    config: &VaultConfig,
    ctx: &AccessContext,
    id: &Uuid,
    update: CredentialUpdate,
) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);

    let rotated = update.new_secret.is_some();
    let view = store.update(ctx, id, update)?;
    println!("✓ Credential updated{}", if rotated { " (secret rotated)" } else { "" });
    print_view(&view);

    Ok(())
}

fn cmd_delete(config: &VaultConfig, ctx: &AccessContext, id: &Uuid) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);

    store.soft_delete(ctx, id)?;
    println!("✓ Credential {} deleted", id);

    Ok(())
}

// ─── Reveal & Audit ──────────────────────────────────────────────────────────

fn cmd_reveal(config: &VaultConfig, ctx: &AccessContext, id: &Uuid) -> Result<(), VaultError> {
    let (db, keys) = open_vault(config)?;
    let systems = SqliteSystemDirectory::new(&db);
    let store = SqliteCredentialStore::new(&db, &keys, &systems);
    let audit = SqliteAuditLog::new(&db);

    let secret = RevealWorkflow::new(&store, &audit, &keys).reveal(ctx, id)?;
    // Bare value on stdout so it can be piped
    println!("{}", secret.as_str());

    Ok(())
}

fn cmd_audit(config: &VaultConfig, id: &Uuid) -> Result<(), VaultError> {
    let db = open_db(config)?;
    let entries = SqliteAuditLog::new(&db).list(id)?;

    if entries.is_empty() {
        println!("No audit log entries for credential: {}", id);
        return Ok(());
    }

    println!("Audit log for credential: {}", id);
    println!("{:-<80}", "");
    for entry in &entries {
        println!("{}", entry);
    }
    println!("{:-<80}", "");

    Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(config: &VaultConfig, socket_path: std::path::PathBuf) -> Result<(), VaultError> {
    let (_db, keys) = open_vault(config)?;

    eprintln!("Starting opsvault gateway at {}...", socket_path.display());
    let backend = Backend::new(config.db_path.clone(), config.busy_timeout, Arc::new(keys));
    UdsServer::new(backend, socket_path).run().await?;

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the database, refusing to create one outside `init`.
fn open_db(config: &VaultConfig) -> Result<Database, VaultError> {
    if !config.db_path.exists() {
        return Err(VaultError::Other(format!(
            "Database not found at {}. Run `opsvault init` first.",
            config.db_path.display()
        )));
    }
    Ok(Database::open(&config.db_path, config.busy_timeout)?)
}

/// Open the database and derive the cipher key from the application secret.
fn open_vault(config: &VaultConfig) -> Result<(Database, DerivedKeyProvider), VaultError> {
    let source = config.app_secret_source();
    if !source.has_secret()? {
        return Err(VaultError::Other(
            "No application secret found. Run `opsvault init` or set OPSVAULT_APP_SECRET."
                .to_string(),
        ));
    }

    let db = open_db(config)?;
    let secret = source.load_or_create()?;
    let keys = DerivedKeyProvider::derive(secret.as_bytes(), config.kdf)?;
    Ok((db, keys))
}

/// Read one line from stdin as a secret, without the trailing newline.
fn read_secret(prompt: &str) -> Result<Zeroizing<String>, VaultError> {
    eprint!("{}: ", prompt);
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']);
    Ok(Zeroizing::new(trimmed.to_string()))
}

fn print_view(view: &CredentialView) {
    println!("Credential details:\n");
    println!("  ID:          {}", view.id);
    println!("  System:      {}", view.system_id);
    println!("  Login:       {}", view.login);
    println!("  Environment: {}", view.environment);
    println!("  Description: {}", view.description);
    if let Some(ref user) = view.reference_user_name {
        println!("  Owner:       {}", user);
    }
    if let Some(ref user_id) = view.reference_user_id {
        println!("  Owner ID:    {}", user_id);
    }
    if !view.notes.is_empty() {
        println!("  Notes:       {}", view.notes);
    }
    println!("  Secret:      [REDACTED]");
    println!("  Created by:  {}", view.created_by);
    println!("  Created:     {}", view.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Updated:     {}", view.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
}
