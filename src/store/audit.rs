// Opsvault: Access Audit Log
//
// Append-only record of who created, viewed, rotated or deleted each
// credential. There is no update or delete on this API, and the schema
// triggers reject both at the SQL level.

use rusqlite::params;
use uuid::Uuid;

use super::db::Database;
use super::models::{AccessContext, AuditAction, AuditLogEntry};
use super::sql::{now_rfc3339, parsed_column, timestamp_column, uuid_column};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

pub trait AccessAuditLog {
    /// Record one event. The timestamp is taken from the server clock.
    fn append(
        &self,
        credential_id: &Uuid,
        action: AuditAction,
        ctx: &AccessContext,
    ) -> Result<(), StoreError>;

    /// Entries for a credential, newest first. Soft-deleted credentials keep
    /// their full history.
    fn list(&self, credential_id: &Uuid) -> Result<Vec<AuditLogEntry>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

/// Writes through the shared connection. When the caller has a transaction
/// open on that connection the row joins it.
pub struct SqliteAuditLog<'a> {
    db: &'a Database,
}

impl<'a> SqliteAuditLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditLogEntry> {
        Ok(AuditLogEntry {
            id: row.get(0)?,
            credential_id: uuid_column(row, 1)?,
            actor_id: row.get(2)?,
            action: parsed_column(row, 3)?,
            ip_address: row.get(4)?,
            timestamp: timestamp_column(row, 5)?,
        })
    }
}

impl<'a> AccessAuditLog for SqliteAuditLog<'a> {
    fn append(
        &self,
        credential_id: &Uuid,
        action: AuditAction,
        ctx: &AccessContext,
    ) -> Result<(), StoreError> {
        self.db.conn().execute(
            "INSERT INTO audit_log (credential_id, actor_id, action, ip_address, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                credential_id.to_string(),
                ctx.actor_id,
                action.as_str(),
                ctx.ip_address,
                now_rfc3339(),
            ],
        )?;

        tracing::debug!(
            credential_id = %credential_id,
            action = %action,
            actor_id = %ctx.actor_id,
            "Audit log entry recorded"
        );

        Ok(())
    }

    fn list(&self, credential_id: &Uuid) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, credential_id, actor_id, action, ip_address, timestamp
             FROM audit_log WHERE credential_id = ?1 ORDER BY id DESC",
        )?;

        let rows = stmt.query_map(params![credential_id.to_string()], Self::row_to_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
