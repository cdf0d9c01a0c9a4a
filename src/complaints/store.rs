//! Complaint Storage
//! Mission: Persist complaints and read them back with their submitter

use crate::auth::models::{UserRole, UserSummary};
use crate::complaints::models::Complaint;
use crate::db::{self, now_timestamp, uuid_column};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const COMPLAINT_SELECT: &str = "SELECT c.id, c.message, c.created_at, c.updated_at,
            u.id, u.name, u.email, u.role
     FROM complaints c
     LEFT JOIN users u ON u.id = c.user_id";

/// Complaint storage with SQLite backend; shares the database file with `UserStore`
pub struct ComplaintStore {
    db_path: String,
}

impl ComplaintStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        db::open(&self.db_path)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS complaints (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_complaints_user ON complaints (user_id);
            CREATE INDEX IF NOT EXISTS idx_complaints_created ON complaints (created_at);",
        )
        .context("Failed to create complaints table")?;

        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Complaint> {
        let user_id: Option<String> = row.get(4)?;
        let user = match user_id {
            Some(id) => {
                let role: String = row.get(7)?;
                Some(UserSummary {
                    id,
                    name: row.get(5)?,
                    email: row.get(6)?,
                    role: UserRole::from_str(&role).unwrap_or_default(),
                })
            }
            None => None,
        };

        Ok(Complaint {
            id: uuid_column(row, 0)?,
            user,
            message: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    pub fn create(&self, user_id: &Uuid, message: &str) -> Result<Complaint> {
        let id = Uuid::new_v4();
        let now = now_timestamp();

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO complaints (id, user_id, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id.to_string(), user_id.to_string(), message.trim(), now],
        )
        .context("Failed to insert complaint")?;

        self.get(&id)?
            .context("Complaint missing right after insert")
    }

    /// Newest first
    pub fn list(&self) -> Result<Vec<Complaint>> {
        let conn = self.connect()?;
        let sql = format!("{} ORDER BY c.created_at DESC, c.id ASC", COMPLAINT_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let complaints = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list complaints")?;
        Ok(complaints)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Complaint>> {
        let conn = self.connect()?;
        let sql = format!("{} WHERE c.id = ?1", COMPLAINT_SELECT);
        conn.query_row(&sql, params![id.to_string()], Self::map_row)
            .optional()
            .context("Failed to load complaint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user_store::UserStore;
    use tempfile::NamedTempFile;

    fn create_test_stores() -> (UserStore, ComplaintStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let users = UserStore::new(db_path, 4).unwrap();
        let complaints = ComplaintStore::new(db_path).unwrap();
        (users, complaints, temp_file)
    }

    #[test]
    fn test_create_populates_user() {
        let (users, complaints, _temp) = create_test_stores();
        let ada = users
            .create_user("Ada", "ada@example.com", "pass", UserRole::User)
            .unwrap();

        let complaint = complaints.create(&ada.id, "  Lift out of order  ").unwrap();
        assert_eq!(complaint.message, "Lift out of order");

        let summary = complaint.user.unwrap();
        assert_eq!(summary.id, ada.id.to_string());
        assert_eq!(summary.email, "ada@example.com");
        assert_eq!(summary.role, UserRole::User);
    }

    #[test]
    fn test_unknown_user_reads_as_null() {
        let (_users, complaints, _temp) = create_test_stores();
        let complaint = complaints.create(&Uuid::new_v4(), "Orphan").unwrap();
        assert!(complaint.user.is_none());

        let json = serde_json::to_value(&complaint).unwrap();
        assert!(json["user"].is_null());
    }

    #[test]
    fn test_list_and_get() {
        let (users, complaints, _temp) = create_test_stores();
        let ada = users
            .create_user("Ada", "ada@example.com", "pass", UserRole::User)
            .unwrap();
        let first = complaints.create(&ada.id, "First").unwrap();
        complaints.create(&ada.id, "Second").unwrap();

        assert_eq!(complaints.list().unwrap().len(), 2);
        assert_eq!(complaints.get(&first.id).unwrap().unwrap().message, "First");
        assert!(complaints.get(&Uuid::new_v4()).unwrap().is_none());
    }
}
