// Opsvault: System Directory
//
// Systems belong to the wider portal; the vault only needs to know whether
// one exists and is active. `SqliteSystemDirectory` is a small registry in
// the vault database so the vault also runs on its own.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::db::Database;
use super::models::System;
use super::sql::{is_constraint_violation, now_rfc3339, timestamp_column, uuid_column};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Existence checks the credential store performs against systems.
pub trait SystemDirectory {
    /// True when `id` names an active system.
    fn system_exists(&self, id: &Uuid) -> Result<bool, StoreError>;

    /// True when `id` names a system, active or not.
    fn system_known(&self, id: &Uuid) -> Result<bool, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteSystemDirectory<'a> {
    db: &'a Database,
}

impl<'a> SqliteSystemDirectory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn row_to_system(row: &rusqlite::Row<'_>) -> rusqlite::Result<System> {
        Ok(System {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            active: row.get(2)?,
            created_at: timestamp_column(row, 3)?,
        })
    }

    /// Register a new, active system.
    pub fn register(&self, name: &str) -> Result<System, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("system name is required".to_string()));
        }

        let id = Uuid::new_v4();
        let now = now_rfc3339();

        let inserted = self.db.conn().execute(
            "INSERT INTO systems (id, name, active, created_at) VALUES (?1, ?2, 1, ?3)",
            params![id.to_string(), name, now],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::Validation(format!(
                    "a system named '{}' already exists",
                    name
                )));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(system_id = %id, name = %name, "System registered");

        self.get(&id)?
            .ok_or_else(|| StoreError::system_not_found(&id))
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<System>, StoreError> {
        let system = self
            .db
            .conn()
            .query_row(
                "SELECT id, name, active, created_at FROM systems WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_system,
            )
            .optional()?;
        Ok(system)
    }

    /// All systems, active first, then by name.
    pub fn list(&self) -> Result<Vec<System>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, name, active, created_at FROM systems
             ORDER BY active DESC, name ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_system)?;

        let mut systems = Vec::new();
        for row in rows {
            systems.push(row?);
        }
        Ok(systems)
    }

    /// Mark a system inactive. Returns false if it was unknown or already inactive.
    pub fn deactivate(&self, id: &Uuid) -> Result<bool, StoreError> {
        let affected = self.db.conn().execute(
            "UPDATE systems SET active = 0 WHERE id = ?1 AND active = 1",
            params![id.to_string()],
        )?;
        if affected > 0 {
            tracing::info!(system_id = %id, "System deactivated");
        }
        Ok(affected > 0)
    }
}

impl<'a> SystemDirectory for SqliteSystemDirectory<'a> {
    fn system_exists(&self, id: &Uuid) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some_and(|s| s.active))
    }

    fn system_known(&self, id: &Uuid) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let db = Database::open_in_memory().unwrap();
        let systems = SqliteSystemDirectory::new(&db);

        let system = systems.register("  AWS Console ").unwrap();
        assert_eq!(system.name, "AWS Console");
        assert!(system.active);

        let fetched = systems.get(&system.id).unwrap().expect("System should exist");
        assert_eq!(fetched.id, system.id);
    }

    #[test]
    fn test_register_rejects_blank_and_duplicate_names() {
        let db = Database::open_in_memory().unwrap();
        let systems = SqliteSystemDirectory::new(&db);

        assert!(matches!(
            systems.register(" "),
            Err(StoreError::Validation(_))
        ));

        systems.register("Postgres").unwrap();
        assert!(matches!(
            systems.register("Postgres"),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_exists_tracks_activity() {
        let db = Database::open_in_memory().unwrap();
        let systems = SqliteSystemDirectory::new(&db);
        let system = systems.register("Jira").unwrap();

        assert!(systems.system_exists(&system.id).unwrap());
        assert!(systems.system_known(&system.id).unwrap());

        assert!(systems.deactivate(&system.id).unwrap());
        assert!(!systems.deactivate(&system.id).unwrap(), "Already inactive");

        assert!(!systems.system_exists(&system.id).unwrap());
        assert!(systems.system_known(&system.id).unwrap());
    }

    #[test]
    fn test_unknown_system() {
        let db = Database::open_in_memory().unwrap();
        let systems = SqliteSystemDirectory::new(&db);
        let id = Uuid::new_v4();

        assert!(!systems.system_exists(&id).unwrap());
        assert!(!systems.system_known(&id).unwrap());
        assert!(systems.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_list_orders_active_first() {
        let db = Database::open_in_memory().unwrap();
        let systems = SqliteSystemDirectory::new(&db);

        let retired = systems.register("Alpha").unwrap();
        systems.register("Zulu").unwrap();
        systems.register("Mike").unwrap();
        systems.deactivate(&retired.id).unwrap();

        let names: Vec<String> = systems.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Mike", "Zulu", "Alpha"]);
    }
}
