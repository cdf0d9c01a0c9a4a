//! SQLite helpers shared by the stores

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{functions::FunctionFlags, types::Type, Connection};
use std::time::Duration;
use uuid::Uuid;

/// Open a connection with the settings every store relies on
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    register_unicode_lower(&conn)?;
    Ok(conn)
}

/// `unicode_lower(text)`: full Unicode lowercase. SQLite's own `lower()` and
/// `LIKE` only fold ASCII.
fn register_unicode_lower(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .context("Failed to register unicode_lower")
}

/// Fixed-width RFC 3339 timestamp, so lexical order matches time order
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQL fragment matching rows whose `column` contains the bound needle,
/// ignoring case. Bind the needle through [`fold_case`].
pub fn contains_folded(column: &str) -> String {
    format!("instr(unicode_lower({}), ?) > 0", column)
}

/// Case-fold a search term the same way `unicode_lower` folds column values
pub fn fold_case(term: &str) -> String {
    term.to_lowercase()
}

/// Read a TEXT column holding a UUID
pub fn uuid_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_lower_folds_non_ascii() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let conn = open(temp_file.path().to_str().unwrap()).unwrap();

        let folded: String = conn
            .query_row("SELECT unicode_lower('GARE DE L''ÉTÉ')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "gare de l'été");

        let null: Option<String> = conn
            .query_row("SELECT unicode_lower(NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());

        let sql = format!("SELECT {}", contains_folded("'Saint-Étienne Châteaucreux'"));
        let hit: bool = conn
            .query_row(&sql, [fold_case("ÉTIENNE CHÂ")], |row| row.get(0))
            .unwrap();
        assert!(hit);

        // Wildcard characters have no special meaning
        let miss: bool = conn.query_row(&sql, [fold_case("%")], |row| row.get(0)).unwrap();
        assert!(!miss);
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), "2025-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
    }
}
