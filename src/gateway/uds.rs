// Opsvault: Unix Domain Socket Server
//
// Listens on a Unix domain socket for newline-delimited JSON-RPC 2.0
// requests from the authenticated front-end. Each connection is handled in a
// spawned tokio task; each request opens its own database connection on a
// blocking thread and shares the derived key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::KeyProvider;
use crate::store::{
    AccessAuditLog, AccessContext, CredentialStore, CredentialUpdate, Database, Environment,
    NewCredential, SqliteAuditLog, SqliteCredentialStore, SqliteSystemDirectory, StoreError,
};
use crate::vault::RevealWorkflow;

use super::protocol::{Outcome, Request, Response, RevealedSecret};

/// Everything a request needs to reach the vault.
#[derive(Clone)]
pub struct Backend {
    db_path: PathBuf,
    busy_timeout: Duration,
    keys: Arc<dyn KeyProvider + Send + Sync>,
}

impl Backend {
    pub fn new(
        db_path: PathBuf,
        busy_timeout: Duration,
        keys: Arc<dyn KeyProvider + Send + Sync>,
    ) -> Self {
        Self {
            db_path,
            busy_timeout,
            keys,
        }
    }
}

/// Unix Domain Socket server for the vault.
pub struct UdsServer {
    backend: Backend,
    socket_path: PathBuf,
}

impl UdsServer {
    pub fn new(backend: Backend, socket_path: PathBuf) -> Self {
        Self {
            backend,
            socket_path,
        }
    }

    /// Start the UDS server. This runs until the process is terminated.
    pub async fn run(&self) -> std::io::Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        tracing::info!(
            socket = %self.socket_path.display(),
            db = %self.backend.db_path.display(),
            "Opsvault gateway listening"
        );

        loop {
            let (stream, _addr) = listener.accept().await?;
            let backend = self.backend.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, backend).await {
                    tracing::error!(error = %e, "Connection handler error");
                }
            });
        }
    }
}

/// Read newline-delimited requests from one client and answer each in order.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    backend: Backend,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let backend = backend.clone();
        let response =
            tokio::task::spawn_blocking(move || process_request(&line, &backend)).await?;

        let line = response.to_line()?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
pub(crate) fn process_request(raw: &str, backend: &Backend) -> Response {
    let Request {
        method, params, id, ..
    } = match Request::parse(raw) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let db = match Database::open(&backend.db_path, backend.busy_timeout) {
        Ok(db) => db,
        Err(e) => return Response::store_failure(id, &e),
    };
    let keys = backend.keys.as_ref();

    let outcome = match method.as_str() {
        "credentials.create" => handle_create(&db, keys, params),
        "credentials.list" => handle_list(&db, keys, params),
        "credentials.get" => handle_get(&db, keys, params),
        "credentials.update" => handle_update(&db, keys, params),
        "credentials.delete" => handle_delete(&db, keys, params),
        "credentials.reveal" => handle_reveal(&db, keys, params),
        "audit.list" => handle_audit_list(&db, params),
        _ => Err(MethodError::UnknownMethod(method.clone())),
    };

    match outcome {
        Ok(result) => Response::success(id, result),
        Err(MethodError::Params(message)) => Response::invalid_params(id, message),
        Err(MethodError::UnknownMethod(name)) => Response::unknown_method(id, &name),
        Err(MethodError::Store(e)) => Response::store_failure(id, &e),
        Err(MethodError::Encode(e)) => {
            tracing::error!(method = %method, error = %e, "Failed to encode result");
            Response::internal(id, "Failed to encode result")
        }
    }
}

enum MethodError {
    Params(String),
    UnknownMethod(String),
    Store(StoreError),
    Encode(serde_json::Error),
}

impl From<StoreError> for MethodError {
    fn from(e: StoreError) -> Self {
        MethodError::Store(e)
    }
}

type MethodResult = Result<Outcome, MethodError>;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Caller identity forwarded by the front-end.
#[derive(Deserialize)]
struct Caller {
    actor_id: String,
    #[serde(default)]
    ip_address: Option<String>,
}

impl Caller {
    fn into_context(self) -> AccessContext {
        AccessContext {
            actor_id: self.actor_id,
            ip_address: self.ip_address.filter(|ip| !ip.trim().is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct CreateParams {
    system_id: Uuid,
    login: String,
    secret: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    reference_user_id: Option<String>,
    #[serde(default)]
    reference_user_name: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    notes: String,
    #[serde(flatten)]
    caller: Caller,
}

#[derive(Deserialize)]
struct SystemParams {
    system_id: Uuid,
}

#[derive(Deserialize)]
struct IdParams {
    id: Uuid,
}

#[derive(Deserialize)]
struct CallerIdParams {
    id: Uuid,
    #[serde(flatten)]
    caller: Caller,
}

#[derive(Deserialize)]
struct UpdateParams {
    id: Uuid,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    reference_user_id: Option<String>,
    #[serde(default)]
    reference_user_name: Option<String>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    new_secret: Option<String>,
    #[serde(flatten)]
    caller: Caller,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, MethodError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| MethodError::Params(format!("Invalid params: {}", e)))
}

fn parse_environment(raw: Option<String>) -> Result<Option<Environment>, MethodError> {
    raw.map(|s| s.parse::<Environment>())
        .transpose()
        .map_err(MethodError::Store)
}

fn encode<T: Serialize>(value: &T) -> MethodResult {
    serde_json::to_value(value)
        .map(Outcome::Json)
        .map_err(MethodError::Encode)
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_create(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: CreateParams = parse_params(params)?;
    let ctx = params.caller.into_context();

    let input = NewCredential {
        system_id: params.system_id,
        description: params.description,
        reference_user_id: params.reference_user_id,
        reference_user_name: params.reference_user_name,
        login: params.login,
        secret: Zeroizing::new(params.secret),
        environment: parse_environment(params.environment)?.unwrap_or_default(),
        notes: params.notes,
    };

    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    let view = store.create(&ctx, input)?;
    encode(&view)
}

fn handle_list(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: SystemParams = parse_params(params)?;
    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    let views = store.list(&params.system_id)?;
    encode(&views)
}

fn handle_get(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: IdParams = parse_params(params)?;
    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    let view = store
        .get(&params.id)?
        .ok_or_else(|| StoreError::credential_not_found(&params.id))?;
    encode(&view)
}

fn handle_update(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: UpdateParams = parse_params(params)?;
    let ctx = params.caller.into_context();

    let update = CredentialUpdate {
        description: params.description,
        reference_user_id: params.reference_user_id,
        reference_user_name: params.reference_user_name,
        login: params.login,
        environment: parse_environment(params.environment)?,
        notes: params.notes,
        new_secret: params.new_secret.map(Zeroizing::new),
    };

    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    let view = store.update(&ctx, &params.id, update)?;
    encode(&view)
}

fn handle_delete(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: CallerIdParams = parse_params(params)?;
    let ctx = params.caller.into_context();

    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    store.soft_delete(&ctx, &params.id)?;
    Ok(Outcome::Json(serde_json::json!({ "deleted": true, "id": params.id.to_string() })))
}

fn handle_reveal(db: &Database, keys: &dyn KeyProvider, params: Value) -> MethodResult {
    let params: CallerIdParams = parse_params(params)?;
    let ctx = params.caller.into_context();

    let systems = SqliteSystemDirectory::new(db);
    let store = SqliteCredentialStore::new(db, keys, &systems);
    let audit = SqliteAuditLog::new(db);
    let secret = RevealWorkflow::new(&store, &audit, keys).reveal(&ctx, &params.id)?;
    Ok(Outcome::Secret(RevealedSecret {
        id: params.id,
        secret,
    }))
}

fn handle_audit_list(db: &Database, params: Value) -> MethodResult {
    let params: IdParams = parse_params(params)?;
    let entries = SqliteAuditLog::new(db).list(&params.id)?;
    encode(&entries)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
