//! Station Storage
//! Mission: Persist stations in SQLite and answer radius-bounded distance queries

use crate::db::{self, contains_folded, fold_case, now_timestamp, uuid_column};
use crate::stations::geo::{bounding_box, haversine_distance};
use crate::stations::models::{GeoPoint, Station, StationDraft, Visibility};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::cmp::Ordering;
use tracing::info;
use uuid::Uuid;

const STATION_COLUMNS: &str = "id, name, lng, lat, address, city, is_active, created_at, updated_at";

/// Station storage with SQLite backend
pub struct StationStore {
    db_path: String,
}

impl StationStore {
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
            "CREATE TABLE IF NOT EXISTS stations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                lng REAL NOT NULL,
                lat REAL NOT NULL,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_stations_name ON stations (name);
            CREATE INDEX IF NOT EXISTS idx_stations_geo ON stations (lat, lng);
            CREATE INDEX IF NOT EXISTS idx_stations_active ON stations (is_active);",
        )
        .context("Failed to create stations table")?;

        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Station> {
        Ok(Station {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            location: GeoPoint::new(row.get(2)?, row.get(3)?),
            address: row.get(4)?,
            city: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn visibility_clause(visibility: Visibility) -> &'static str {
        match visibility {
            Visibility::ActiveOnly => " AND is_active = 1",
            Visibility::All => "",
        }
    }

    pub fn list(&self, visibility: Visibility) -> Result<Vec<Station>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM stations WHERE 1 = 1{} ORDER BY created_at ASC, id ASC",
            STATION_COLUMNS,
            Self::visibility_clause(visibility)
        );
        let mut stmt = conn.prepare(&sql)?;
        let stations = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list stations")?;
        Ok(stations)
    }

    /// Case-insensitive substring match on the station name
    pub fn search_by_name(&self, term: &str, visibility: Visibility) -> Result<Vec<Station>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM stations WHERE {}{} ORDER BY name ASC, id ASC",
            STATION_COLUMNS,
            contains_folded("name"),
            Self::visibility_clause(visibility)
        );
        let mut stmt = conn.prepare(&sql)?;
        let stations = stmt
            .query_map(params![fold_case(term)], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to search stations")?;
        Ok(stations)
    }

    pub fn get(&self, id: &Uuid, visibility: Visibility) -> Result<Option<Station>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM stations WHERE id = ?1{}",
            STATION_COLUMNS,
            Self::visibility_clause(visibility)
        );
        conn.query_row(&sql, params![id.to_string()], Self::map_row)
            .optional()
            .context("Failed to load station")
    }

    /// Insert a validated draft
    pub fn create(&self, draft: &StationDraft) -> Result<Station> {
        let location = draft
            .location
            .clone()
            .context("Station draft has no location")?;
        let now = now_timestamp();

        let station = Station {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_string(),
            location,
            address: draft.address.trim().to_string(),
            city: draft.city.trim().to_string(),
            is_active: draft.is_active,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO stations (id, name, lng, lat, address, city, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                station.id.to_string(),
                station.name,
                station.location.longitude(),
                station.location.latitude(),
                station.address,
                station.city,
                station.is_active,
                station.created_at,
                station.updated_at,
            ],
        )
        .context("Failed to insert station")?;

        info!("Created station {} ({})", station.name, station.id);
        Ok(station)
    }

    /// Overwrite a station with a validated draft. `None` if the id is unknown.
    pub fn update(&self, id: &Uuid, draft: &StationDraft) -> Result<Option<Station>> {
        let location = draft
            .location
            .clone()
            .context("Station draft has no location")?;

        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE stations
                 SET name = ?1, lng = ?2, lat = ?3, address = ?4, city = ?5,
                     is_active = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    draft.name.trim(),
                    location.longitude(),
                    location.latitude(),
                    draft.address.trim(),
                    draft.city.trim(),
                    draft.is_active,
                    now_timestamp(),
                    id.to_string(),
                ],
            )
            .context("Failed to update station")?;

        if rows == 0 {
            return Ok(None);
        }
        self.get(id, Visibility::All)
    }

    /// Returns whether a row was removed
    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn
            .execute("DELETE FROM stations WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete station")?;

        if rows > 0 {
            info!("Deleted station {}", id);
        }
        Ok(rows > 0)
    }

    /// Active stations ordered by distance from `center`, optionally within `max_distance` meters
    pub fn nearest_active(
        &self,
        center: &GeoPoint,
        max_distance: Option<f64>,
        limit: usize,
    ) -> Result<Vec<(Station, f64)>> {
        let mut sql = format!("SELECT {} FROM stations WHERE is_active = 1", STATION_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        // The index only narrows the scan; exact distances are computed below
        if let Some(bbox) = max_distance.map(|d| bounding_box(center, d)) {
            sql.push_str(" AND lat BETWEEN ? AND ?");
            values.push(Value::Real(bbox.min_lat));
            values.push(Value::Real(bbox.max_lat));
            if let Some((min_lng, max_lng)) = bbox.lng_range {
                sql.push_str(" AND lng BETWEEN ? AND ?");
                values.push(Value::Real(min_lng));
                values.push(Value::Real(max_lng));
            }
        }

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query stations near point")?;

        let mut hits: Vec<(Station, f64)> = candidates
            .into_iter()
            .map(|s| {
                let d = haversine_distance(center, &s.location);
                (s, d)
            })
            .filter(|(_, d)| max_distance.map_or(true, |max| *d <= max))
            .collect();

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        hits.truncate(limit);

        Ok(hits)
    }
}
