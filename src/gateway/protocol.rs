// Opsvault: Gateway Protocol
//
// JSON-RPC 2.0 envelope for the UDS gateway and the mapping from vault
// errors onto its error codes. Error messages are the `Display` text of the
// vault errors, which never carry cipher or SQL detail.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::store::StoreError;

const VERSION: &str = "2.0";

// Codes reserved by JSON-RPC
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Vault codes
pub const NOT_FOUND: i32 = -32004;
pub const CREDENTIAL_ERROR: i32 = -32010;

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl Request {
    /// Parse one line off the socket. A line that is not a request at all
    /// comes back as the error response to send.
    pub fn parse(line: &str) -> Result<Self, Response> {
        let request: Request = serde_json::from_str(line)
            .map_err(|e| Response::failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)))?;

        if request.jsonrpc != VERSION {
            return Err(Response::failure(
                request.id,
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }
        if request.method.is_empty() {
            return Err(Response::failure(
                request.id,
                INVALID_REQUEST,
                "method must not be empty",
            ));
        }
        Ok(request)
    }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// A successful result. A revealed secret keeps its zeroizing buffer all the
/// way to serialization instead of being copied into a `Value`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Json(Value),
    Secret(RevealedSecret),
}

pub struct RevealedSecret {
    pub id: Uuid,
    pub secret: Zeroizing<String>,
}

impl Serialize for RevealedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("RevealedSecret", 2)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("secret", self.secret.as_str())?;
        state.end()
    }
}

impl std::fmt::Debug for RevealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealedSecret")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl Response {
    pub fn success(id: Value, outcome: Outcome) -> Self {
        Self {
            jsonrpc: VERSION,
            result: Some(outcome),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: VERSION,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }

    pub fn invalid_params(id: Value, message: impl Into<String>) -> Self {
        Self::failure(id, INVALID_PARAMS, message)
    }

    pub fn unknown_method(id: Value, method: &str) -> Self {
        Self::failure(id, METHOD_NOT_FOUND, format!("Unknown method: {}", method))
    }

    pub fn internal(id: Value, message: impl Into<String>) -> Self {
        Self::failure(id, INTERNAL_ERROR, message)
    }

    /// Answer a failed vault operation.
    pub fn store_failure(id: Value, err: &StoreError) -> Self {
        let code = match err {
            StoreError::Validation(_) => INVALID_PARAMS,
            StoreError::NotFound { .. } => NOT_FOUND,
            StoreError::Cipher(_) => CREDENTIAL_ERROR,
            StoreError::Database(_) => INTERNAL_ERROR,
        };
        Self::failure(id, code, err.to_string())
    }

    /// Serialize as one socket line. The buffer is wiped on drop since a
    /// reveal answer carries plaintext.
    pub fn to_line(&self) -> serde_json::Result<Zeroizing<String>> {
        let mut line = Zeroizing::new(serde_json::to_string(self)?);
        line.push('\n');
        Ok(line)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
