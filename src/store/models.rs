// Opsvault: Vault data models
//
// SECURITY: no type in this file that can be serialized carries a secret.
// Plaintext only appears in the input structs (`NewCredential`,
// `CredentialUpdate`), whose Debug output redacts it, and the sealed form
// never leaves the store except through the reveal path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::StoreError;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Deployment environment a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "PRODUCTION",
            Environment::Staging => "STAGING",
            Environment::Development => "DEVELOPMENT",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRODUCTION" | "PROD" => Ok(Environment::Production),
            "STAGING" => Ok(Environment::Staging),
            "DEVELOPMENT" | "DEV" => Ok(Environment::Development),
            other => Err(StoreError::Validation(format!(
                "unknown environment '{}', expected PRODUCTION, STAGING or DEVELOPMENT",
                other
            ))),
        }
    }
}

/// The kinds of event recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    ViewSecret,
    ChangeSecret,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::ViewSecret => "VIEW_SECRET",
            AuditAction::ChangeSecret => "CHANGE_SECRET",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "VIEW_SECRET" => Ok(AuditAction::ViewSecret),
            "CHANGE_SECRET" => Ok(AuditAction::ChangeSecret),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// Who is acting, as resolved by the authentication layer in front of the
/// vault. Recorded on every audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    pub actor_id: String,
    pub ip_address: Option<String>,
}

impl AccessContext {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.actor_id.trim().is_empty() {
            return Err(StoreError::Validation("actor id is required".to_string()));
        }
        Ok(())
    }
}

// ─── Systems ─────────────────────────────────────────────────────────────────

/// A third-party platform that credentials belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// The read projection of a credential. Has no secret-bearing field at all:
/// the sealed secret is never selected into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialView {
    pub id: Uuid,
    pub system_id: Uuid,
    pub description: String,
    pub reference_user_id: Option<String>,
    pub reference_user_name: Option<String>,
    pub login: String,
    pub environment: Environment,
    pub notes: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for CredentialView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) {}",
            self.id, self.login, self.environment, self.description
        )
    }
}

/// Input for creating a credential.
pub struct NewCredential {
    pub system_id: Uuid,
    pub description: String,
    pub reference_user_id: Option<String>,
    pub reference_user_name: Option<String>,
    pub login: String,
    pub secret: Zeroizing<String>,
    pub environment: Environment,
    pub notes: String,
}

impl NewCredential {
    /// A credential with only the required fields set.
    pub fn new(system_id: Uuid, login: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            system_id,
            description: String::new(),
            reference_user_id: None,
            reference_user_name: None,
            login: login.into(),
            secret: Zeroizing::new(secret.into()),
            environment: Environment::default(),
            notes: String::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.login.trim().is_empty() {
            return Err(StoreError::Validation("login is required".to_string()));
        }
        if self.secret.is_empty() {
            return Err(StoreError::Validation("secret is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("system_id", &self.system_id)
            .field("description", &self.description)
            .field("reference_user_id", &self.reference_user_id)
            .field("reference_user_name", &self.reference_user_name)
            .field("login", &self.login)
            .field("secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("notes", &self.notes)
            .finish()
    }
}

/// A partial update. `None` leaves a field as it is; for the two reference
/// fields an empty string clears the value.
#[derive(Default)]
pub struct CredentialUpdate {
    pub description: Option<String>,
    pub reference_user_id: Option<String>,
    pub reference_user_name: Option<String>,
    pub login: Option<String>,
    pub environment: Option<Environment>,
    pub notes: Option<String>,
    /// Rotates the secret when present.
    pub new_secret: Option<Zeroizing<String>>,
}

impl CredentialUpdate {
    /// True when applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.reference_user_id.is_none()
            && self.reference_user_name.is_none()
            && self.login.is_none()
            && self.environment.is_none()
            && self.notes.is_none()
            && self.new_secret.is_none()
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if matches!(&self.login, Some(login) if login.trim().is_empty()) {
            return Err(StoreError::Validation("login must not be empty".to_string()));
        }
        if matches!(&self.new_secret, Some(secret) if secret.is_empty()) {
            return Err(StoreError::Validation(
                "new secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("description", &self.description)
            .field("reference_user_id", &self.reference_user_id)
            .field("reference_user_name", &self.reference_user_name)
            .field("login", &self.login)
            .field("environment", &self.environment)
            .field("notes", &self.notes)
            .field("new_secret", &self.new_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub credential_id: Uuid,
    pub actor_id: String,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for AuditLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} by '{}'",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.actor_id
        )?;
        if let Some(ref ip) = self.ip_address {
            write!(f, " from {}", ip)?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> CredentialView {
        CredentialView {
            id: Uuid::new_v4(),
            system_id: Uuid::new_v4(),
            description: "Billing DB read replica".to_string(),
            reference_user_id: None,
            reference_user_name: Some("Ops on-call".to_string()),
            login: "svc_user".to_string(),
            environment: Environment::Production,
            notes: String::new(),
            created_by: "alice".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_credential_debug_redacts_secret() {
        let cred = NewCredential::new(Uuid::new_v4(), "svc_user", "S3cr3t!");
        let debug_output = format!("{:?}", cred);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(
            !debug_output.contains("S3cr3t!"),
            "Debug output must NEVER contain the raw secret"
        );
    }

    #[test]
    fn test_update_debug_redacts_secret() {
        let update = CredentialUpdate {
            new_secret: Some(Zeroizing::new("rotated-value".to_string())),
            ..Default::default()
        };
        let debug_output = format!("{:?}", update);
        assert!(!debug_output.contains("rotated-value"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_view_json_has_no_secret_field() {
        let json = serde_json::to_string(&sample_view()).unwrap();
        assert!(!json.contains("secret"), "View JSON must not contain any secret field");
        assert!(!json.contains("ciphertext"));
        assert!(json.contains("\"environment\":\"PRODUCTION\""));
    }

    #[test]
    fn test_view_display() {
        let view = sample_view();
        let display = format!("{}", view);
        assert!(display.contains("svc_user"));
        assert!(display.contains("PRODUCTION"));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("STAGING".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!(matches!(
            "qa".parse::<Environment>(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_audit_action_string_forms_agree_with_serde() {
        for action in [
            AuditAction::Create,
            AuditAction::ViewSecret,
            AuditAction::ChangeSecret,
            AuditAction::Delete,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_new_credential_validation() {
        let id = Uuid::new_v4();
        assert!(NewCredential::new(id, "svc_user", "pw").validate().is_ok());
        assert!(NewCredential::new(id, "  ", "pw").validate().is_err());
        assert!(NewCredential::new(id, "svc_user", "").validate().is_err());
    }

    #[test]
    fn test_update_validation_and_emptiness() {
        assert!(CredentialUpdate::default().is_empty());
        assert!(CredentialUpdate::default().validate().is_ok());

        let blank_login = CredentialUpdate {
            login: Some(String::new()),
            ..Default::default()
        };
        assert!(!blank_login.is_empty());
        assert!(blank_login.validate().is_err());

        let blank_secret = CredentialUpdate {
            new_secret: Some(Zeroizing::new(String::new())),
            ..Default::default()
        };
        assert!(blank_secret.validate().is_err());
    }

    #[test]
    fn test_access_context() {
        let ctx = AccessContext::new("alice").with_ip("10.0.0.7");
        assert_eq!(ctx.actor_id, "alice");
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.7"));
        assert!(ctx.validate().is_ok());
        assert!(AccessContext::new(" ").validate().is_err());
    }

    #[test]
    fn test_audit_entry_display() {
        let entry = AuditLogEntry {
            id: 1,
            credential_id: Uuid::new_v4(),
            actor_id: "bob".to_string(),
            action: AuditAction::ViewSecret,
            ip_address: Some("192.168.1.5".to_string()),
            timestamp: Utc::now(),
        };
        let display = format!("{}", entry);
        assert!(display.contains("VIEW_SECRET by 'bob'"));
        assert!(display.contains("from 192.168.1.5"));
    }
}
