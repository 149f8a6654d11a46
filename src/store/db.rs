// Opsvault: SQLite Database Management
//
// Opens the vault database and applies the schema. Secrets are sealed by
// the application before they reach SQLite; the file itself is plain.
// Append-only and soft-delete rules are enforced by triggers so that no
// code path, ours or an operator's ad-hoc SQL, can rewrite history.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around the vault's SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// `busy_timeout` bounds how long a write waits on another writer before
    /// the call fails with a storage error.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run schema migrations to create or update tables.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS systems (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credentials (
                id                   TEXT PRIMARY KEY,
                system_id            TEXT NOT NULL REFERENCES systems(id),
                description          TEXT NOT NULL DEFAULT '',
                reference_user_id    TEXT,
                reference_user_name  TEXT,
                login                TEXT NOT NULL,
                secret_ciphertext    TEXT NOT NULL,
                environment          TEXT NOT NULL DEFAULT 'DEVELOPMENT'
                                     CHECK (environment IN ('PRODUCTION', 'STAGING', 'DEVELOPMENT')),
                notes                TEXT NOT NULL DEFAULT '',
                created_by           TEXT NOT NULL,
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL,
                active               INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                credential_id   TEXT NOT NULL REFERENCES credentials(id),
                actor_id        TEXT NOT NULL,
                action          TEXT NOT NULL
                                CHECK (action IN ('CREATE', 'VIEW_SECRET', 'CHANGE_SECRET', 'DELETE')),
                ip_address      TEXT,
                timestamp       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_credential
                ON audit_log(credential_id);

            CREATE INDEX IF NOT EXISTS idx_credentials_system
                ON credentials(system_id, active);

            CREATE TRIGGER IF NOT EXISTS audit_log_no_update
                BEFORE UPDATE ON audit_log
            BEGIN
                SELECT RAISE(ABORT, 'audit_log is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
                BEFORE DELETE ON audit_log
            BEGIN
                SELECT RAISE(ABORT, 'audit_log is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS credentials_no_delete
                BEFORE DELETE ON credentials
            BEGIN
                SELECT RAISE(ABORT, 'credentials are soft-deleted only');
            END;

            CREATE TRIGGER IF NOT EXISTS credentials_immutable_provenance
                BEFORE UPDATE OF id, system_id, created_by, created_at ON credentials
                WHEN NEW.id IS NOT OLD.id
                  OR NEW.system_id IS NOT OLD.system_id
                  OR NEW.created_by IS NOT OLD.created_by
                  OR NEW.created_at IS NOT OLD.created_at
            BEGIN
                SELECT RAISE(ABORT, 'credential identity and provenance are immutable');
            END;
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
