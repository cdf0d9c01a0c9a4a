//! User Storage
//! Mission: Persist user accounts, password hashes and reset tokens in SQLite

use crate::auth::models::{User, UserRole};
use crate::db::{self, contains_folded, fold_case, now_timestamp, uuid_column};
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, \
     reset_password_token, reset_password_expire, last_login, created_at, updated_at";

/// Admin listing filters
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub sort: UserSort,
    pub limit: u32,
    pub offset: u32,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            role: None,
            is_active: None,
            sort: UserSort::default(),
            limit: 10,
            offset: 0,
        }
    }
}

/// Whitelisted sort column plus direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort {
    column: &'static str,
    descending: bool,
}

impl Default for UserSort {
    fn default() -> Self {
        Self {
            column: "created_at",
            descending: true,
        }
    }
}

impl UserSort {
    /// Parse `createdAt`, `-name`, ... into a sort order. Unknown fields yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };

        let column = match field {
            "createdAt" => "created_at",
            "updatedAt" => "updated_at",
            "name" => "name",
            "email" => "email",
            "lastLogin" => "last_login",
            _ => return None,
        };

        Some(Self { column, descending })
    }

    fn order_by(&self) -> String {
        let dir = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}, id ASC", self.column, dir)
    }
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
    bcrypt_cost: u32,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str, bcrypt_cost: u32) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            bcrypt_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        db::open(&self.db_path)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                is_active INTEGER NOT NULL DEFAULT 1,
                reset_password_token TEXT,
                reset_password_expire INTEGER,
                last_login TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_reset_token
                ON users (reset_password_token);",
        )
        .context("Failed to create users table")?;

        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let role_str: String = row.get(4)?;
        Ok(User {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: UserRole::from_str(&role_str).unwrap_or_default(),
            is_active: row.get(5)?,
            reset_password_token: row.get(6)?,
            reset_password_expire: row.get(7)?,
            last_login: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, self.bcrypt_cost).context("Failed to hash password")
    }

    /// Create a new user with a hashed password
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User> {
        let password_hash = self.hash_password(password)?;
        let now = now_timestamp();

        let user = User {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password_hash,
            role,
            is_active: true,
            reset_password_token: None,
            reset_password_expire: None,
            last_login: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.is_active,
                user.created_at,
                user.updated_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("Created user: {} ({})", user.email, user.role.as_str());

        Ok(user)
    }

    /// Create the bootstrap admin account unless the email is already taken
    pub fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<()> {
        if self.get_user_by_email(email)?.is_some() {
            return Ok(());
        }
        self.create_user(name, email, password, UserRole::Admin)?;
        warn!("Bootstrap admin {} created; change its password", email);
        Ok(())
    }

    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        conn.query_row(&sql, params![id.to_string()], Self::map_row)
            .optional()
            .context("Failed to load user by id")
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        conn.query_row(&sql, params![email.trim()], Self::map_row)
            .optional()
            .context("Failed to load user by email")
    }

    /// Compare a candidate password against the stored hash
    pub fn check_password(&self, user: &User, password: &str) -> Result<bool> {
        verify(password, &user.password_hash).context("Failed to verify password")
    }

    /// Look up by email and check the password. `None` for unknown email or bad password.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        match self.get_user_by_email(email)? {
            Some(user) if self.check_password(&user, password)? => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub fn record_login(&self, id: &Uuid) -> Result<()> {
        let conn = self.connect()?;
        let now = now_timestamp();
        conn.execute(
            "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id.to_string()],
        )
        .context("Failed to record login")?;
        Ok(())
    }

    /// Update name and/or email. Returns the updated user, or `None` if it vanished.
    pub fn update_details(
        &self,
        id: &Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE users
                 SET name = COALESCE(?1, name), email = COALESCE(?2, email), updated_at = ?3
                 WHERE id = ?4",
                params![
                    name.map(str::trim),
                    email.map(str::trim),
                    now_timestamp(),
                    id.to_string()
                ],
            )
            .context("Failed to update user details")?;

        if rows == 0 {
            return Ok(None);
        }
        self.get_user_by_id(id)
    }

    /// Store a new password hash. Any outstanding reset token is consumed with it.
    pub fn set_password(&self, id: &Uuid, password: &str) -> Result<()> {
        let password_hash = self.hash_password(password)?;
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE users
                 SET password_hash = ?1, reset_password_token = NULL,
                     reset_password_expire = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![password_hash, now_timestamp(), id.to_string()],
            )
            .context("Failed to update password")?;

        if rows == 0 {
            anyhow::bail!("User not found");
        }

        info!("Password updated for user {}", id);
        Ok(())
    }

    pub fn set_reset_token(&self, id: &Uuid, hashed: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE users SET reset_password_token = ?1, reset_password_expire = ?2 WHERE id = ?3",
            params![hashed, expires_at.timestamp(), id.to_string()],
        )
        .context("Failed to store reset token")?;
        Ok(())
    }

    pub fn clear_reset_token(&self, id: &Uuid) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE users SET reset_password_token = NULL, reset_password_expire = NULL WHERE id = ?1",
            params![id.to_string()],
        )
        .context("Failed to clear reset token")?;
        Ok(())
    }

    /// User whose stored reset hash matches and has not expired as of `now`
    pub fn find_by_reset_token(&self, hashed: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM users WHERE reset_password_token = ?1 AND reset_password_expire > ?2",
            USER_COLUMNS
        );
        conn.query_row(&sql, params![hashed, now.timestamp()], Self::map_row)
            .optional()
            .context("Failed to look up reset token")
    }

    /// Set a new password for whoever holds the live reset token, clearing the
    /// token in the same statement. At most one caller gets `Some` per token.
    pub fn consume_reset_token(
        &self,
        hashed: &str,
        now: DateTime<Utc>,
        password: &str,
    ) -> Result<Option<User>> {
        let password_hash = self.hash_password(password)?;
        let conn = self.connect()?;
        let consumed: Option<String> = conn
            .query_row(
                "UPDATE users
                 SET password_hash = ?1, reset_password_token = NULL,
                     reset_password_expire = NULL, updated_at = ?2
                 WHERE reset_password_token = ?3 AND reset_password_expire > ?4
                 RETURNING id",
                params![password_hash, now_timestamp(), hashed, now.timestamp()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to consume reset token")?;

        let Some(raw_id) = consumed else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&raw_id).context("Stored user id is not a UUID")?;
        info!("Password updated for user {}", id);
        self.get_user_by_id(&id)
    }

    /// Filtered page of users plus the total number matching the filter
    pub fn list_users(&self, filter: &UserFilter) -> Result<(Vec<User>, u64)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            clauses.push(format!(
                "({} OR {})",
                contains_folded("name"),
                contains_folded("email")
            ));
            let needle = fold_case(search.trim());
            values.push(Value::Text(needle.clone()));
            values.push(Value::Text(needle));
        }
        if let Some(role) = filter.role {
            clauses.push("role = ?".to_string());
            values.push(Value::Text(role.as_str().to_string()));
        }
        if let Some(is_active) = filter.is_active {
            clauses.push("is_active = ?".to_string());
            values.push(Value::Integer(is_active as i64));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.connect()?;

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM users{}", where_sql),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .context("Failed to count users")?;

        let sql = format!(
            "SELECT {} FROM users{} ORDER BY {} LIMIT {} OFFSET {}",
            USER_COLUMNS,
            where_sql,
            filter.sort.order_by(),
            filter.limit,
            filter.offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?;

        Ok((users, total.max(0) as u64))
    }
}
