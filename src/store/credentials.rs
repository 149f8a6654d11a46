// Opsvault: Credential Store
//
// CRUD over credential records. This is the only code that reads or writes
// the `secret_ciphertext` column. Read projections name their columns
// explicitly and never select it; the single ciphertext-only projection
// exists for the reveal workflow.
//
// Every mutation and its audit row share one transaction: either both are
// stored or neither is.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::crypto::{encrypt, CipherBlob, KeyProvider};

use super::audit::{AccessAuditLog, SqliteAuditLog};
use super::db::Database;
use super::models::{AccessContext, AuditAction, CredentialUpdate, CredentialView, NewCredential};
use super::sql::{now_rfc3339, parsed_column, timestamp_column, uuid_column};
use super::systems::SystemDirectory;
use super::StoreError;

/// Columns of `CredentialView`, in `row_to_view` order. No secret column.
const VIEW_COLUMNS: &str = "id, system_id, description, reference_user_id, reference_user_name,
     login, environment, notes, created_by, created_at, updated_at";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over credential storage operations.
pub trait CredentialStore {
    /// Seal the secret, store the credential and record a CREATE event.
    fn create(
        &self,
        ctx: &AccessContext,
        credential: NewCredential,
    ) -> Result<CredentialView, StoreError>;

    /// Active credentials of a system, oldest first.
    fn list(&self, system_id: &Uuid) -> Result<Vec<CredentialView>, StoreError>;

    /// An active credential by id.
    fn get(&self, id: &Uuid) -> Result<Option<CredentialView>, StoreError>;

    /// Apply a partial update. A new secret replaces the stored blob and
    /// records CHANGE_SECRET; without one the blob is left untouched.
    fn update(
        &self,
        ctx: &AccessContext,
        id: &Uuid,
        update: CredentialUpdate,
    ) -> Result<CredentialView, StoreError>;

    /// Deactivate a credential and record a DELETE event. The row and its
    /// audit history stay.
    fn soft_delete(&self, ctx: &AccessContext, id: &Uuid) -> Result<(), StoreError>;

    /// Only the sealed secret of an active credential. Nothing else is loaded.
    fn secret_ciphertext(&self, id: &Uuid) -> Result<Option<CipherBlob>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteCredentialStore<'a> {
    db: &'a Database,
    keys: &'a dyn KeyProvider,
    systems: &'a dyn SystemDirectory,
    audit: SqliteAuditLog<'a>,
}

impl<'a> SqliteCredentialStore<'a> {
    pub fn new(
        db: &'a Database,
        keys: &'a dyn KeyProvider,
        systems: &'a dyn SystemDirectory,
    ) -> Self {
        Self {
            db,
            keys,
            systems,
            audit: SqliteAuditLog::new(db),
        }
    }

    fn row_to_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialView> {
        Ok(CredentialView {
            id: uuid_column(row, 0)?,
            system_id: uuid_column(row, 1)?,
            description: row.get(2)?,
            reference_user_id: row.get(3)?,
            reference_user_name: row.get(4)?,
            login: row.get(5)?,
            environment: parsed_column(row, 6)?,
            notes: row.get(7)?,
            created_by: row.get(8)?,
            created_at: timestamp_column(row, 9)?,
            updated_at: timestamp_column(row, 10)?,
        })
    }

    fn require(&self, id: &Uuid) -> Result<CredentialView, StoreError> {
        self.get(id)?
            .ok_or_else(|| StoreError::credential_not_found(id))
    }
}

/// Empty string clears an optional reference field.
fn merge_reference(update: Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(value),
        None => current,
    }
}

impl<'a> CredentialStore for SqliteCredentialStore<'a> {
    fn create(
        &self,
        ctx: &AccessContext,
        credential: NewCredential,
    ) -> Result<CredentialView, StoreError> {
        ctx.validate()?;
        credential.validate()?;

        if !self.systems.system_exists(&credential.system_id)? {
            return Err(StoreError::system_not_found(&credential.system_id));
        }

        let blob = encrypt(&credential.secret, self.keys.cipher_key())?;
        let id = Uuid::new_v4();
        let now = now_rfc3339();

        let tx = self.db.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT INTO credentials
                (id, system_id, description, reference_user_id, reference_user_name,
                 login, secret_ciphertext, environment, notes, created_by,
                 created_at, updated_at, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, 1)",
            params![
                id.to_string(),
                credential.system_id.to_string(),
                credential.description,
                merge_reference(credential.reference_user_id, None),
                merge_reference(credential.reference_user_name, None),
                credential.login,
                blob.as_str(),
                credential.environment.as_str(),
                credential.notes,
                ctx.actor_id,
                now,
            ],
        )?;

        self.audit.append(&id, AuditAction::Create, ctx)?;

        tx.commit()?;

        tracing::info!(
            credential_id = %id,
            system_id = %credential.system_id,
            actor_id = %ctx.actor_id,
            "Credential stored"
        );

        self.require(&id)
    }

    fn list(&self, system_id: &Uuid) -> Result<Vec<CredentialView>, StoreError> {
        if !self.systems.system_known(system_id)? {
            return Err(StoreError::system_not_found(system_id));
        }

        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {VIEW_COLUMNS} FROM credentials
             WHERE system_id = ?1 AND active = 1
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![system_id.to_string()], Self::row_to_view)?;

        let mut views = Vec::new();
        for row in rows {
            views.push(row?);
        }
        Ok(views)
    }

    fn get(&self, id: &Uuid) -> Result<Option<CredentialView>, StoreError> {
        let view = self
            .db
            .conn()
            .query_row(
                &format!("SELECT {VIEW_COLUMNS} FROM credentials WHERE id = ?1 AND active = 1"),
                params![id.to_string()],
                Self::row_to_view,
            )
            .optional()?;
        Ok(view)
    }

    fn update(
        &self,
        ctx: &AccessContext,
        id: &Uuid,
        update: CredentialUpdate,
    ) -> Result<CredentialView, StoreError> {
        ctx.validate()?;
        update.validate()?;

        // Take the write lock up front so the read-merge-write below cannot
        // interleave with another writer.
        let tx = Transaction::new_unchecked(self.db.conn(), TransactionBehavior::Immediate)?;

        let current = self.require(id)?;
        if update.is_empty() {
            return Ok(current);
        }

        let CredentialUpdate {
            description,
            reference_user_id,
            reference_user_name,
            login,
            environment,
            notes,
            new_secret,
        } = update;

        let rotated = new_secret
            .as_ref()
            .map(|secret| encrypt(secret, self.keys.cipher_key()))
            .transpose()?;

        tx.execute(
            "UPDATE credentials SET
                description = ?2,
                reference_user_id = ?3,
                reference_user_name = ?4,
                login = ?5,
                environment = ?6,
                notes = ?7,
                secret_ciphertext = COALESCE(?8, secret_ciphertext),
                updated_at = ?9
             WHERE id = ?1 AND active = 1",
            params![
                id.to_string(),
                description.unwrap_or(current.description),
                merge_reference(reference_user_id, current.reference_user_id),
                merge_reference(reference_user_name, current.reference_user_name),
                login.unwrap_or(current.login),
                environment.unwrap_or(current.environment).as_str(),
                notes.unwrap_or(current.notes),
                rotated.as_ref().map(|blob| blob.as_str()),
                now_rfc3339(),
            ],
        )?;

        if rotated.is_some() {
            self.audit.append(id, AuditAction::ChangeSecret, ctx)?;
        }

        tx.commit()?;

        tracing::info!(
            credential_id = %id,
            actor_id = %ctx.actor_id,
            secret_rotated = rotated.is_some(),
            "Credential updated"
        );

        self.require(id)
    }

    fn soft_delete(&self, ctx: &AccessContext, id: &Uuid) -> Result<(), StoreError> {
        ctx.validate()?;

        let tx = Transaction::new_unchecked(self.db.conn(), TransactionBehavior::Immediate)?;

        let affected = tx.execute(
            "UPDATE credentials SET active = 0, updated_at = ?2 WHERE id = ?1 AND active = 1",
            params![id.to_string(), now_rfc3339()],
        )?;
        if affected == 0 {
            return Err(StoreError::credential_not_found(id));
        }

        self.audit.append(id, AuditAction::Delete, ctx)?;

        tx.commit()?;

        tracing::info!(credential_id = %id, actor_id = %ctx.actor_id, "Credential deactivated");
        Ok(())
    }

    fn secret_ciphertext(&self, id: &Uuid) -> Result<Option<CipherBlob>, StoreError> {
        let raw: Option<String> = self
            .db
            .conn()
            .query_row(
                "SELECT secret_ciphertext FROM credentials WHERE id = ?1 AND active = 1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(CipherBlob::from_stored))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
