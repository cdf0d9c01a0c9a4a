//! Station Models
//! Mission: Station records, geographic points and their validation rules

use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether reads may return inactive stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    ActiveOnly,
    All,
}

/// GeoJSON-style point, coordinates are `[longitude, latitude]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_kind")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

fn point_kind() -> String {
    "Point".to_string()
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: point_kind(),
            coordinates: vec![longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates.first().copied().unwrap_or(f64::NAN)
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates.get(1).copied().unwrap_or(f64::NAN)
    }

    /// Exactly two finite coordinates inside the longitude/latitude ranges
    pub fn is_valid(&self) -> bool {
        self.kind == "Point"
            && self.coordinates.len() == 2
            && valid_longitude(self.longitude())
            && valid_latitude(self.latitude())
    }
}

pub fn valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng)
}

pub fn valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

/// Train station
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub address: String,
    pub city: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Create/update body; on update every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInput {
    pub name: Option<String>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub is_active: Option<bool>,
}

/// A complete station record awaiting validation and persistence
#[derive(Debug, Clone, PartialEq)]
pub struct StationDraft {
    pub name: String,
    pub location: Option<GeoPoint>,
    pub address: String,
    pub city: String,
    pub is_active: bool,
}

impl StationDraft {
    pub fn from_input(input: StationInput) -> Self {
        Self {
            name: input.name.unwrap_or_default(),
            location: input.location,
            address: input.address.unwrap_or_default(),
            city: input.city.unwrap_or_default(),
            is_active: input.is_active.unwrap_or(true),
        }
    }

    /// Overlay a partial update on an existing station
    pub fn merged(station: &Station, patch: StationInput) -> Self {
        Self {
            name: patch.name.unwrap_or_else(|| station.name.clone()),
            location: Some(patch.location.unwrap_or_else(|| station.location.clone())),
            address: patch.address.unwrap_or_else(|| station.address.clone()),
            city: patch.city.unwrap_or_else(|| station.city.clone()),
            is_active: patch.is_active.unwrap_or(station.is_active),
        }
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.text(
            &self.name,
            "Station name is required",
            100,
            "Station name cannot exceed 100 characters",
        );
        match &self.location {
            None => errors.push("Station coordinates are required"),
            Some(point) if !point.is_valid() => errors.push(
                "Invalid coordinates. Longitude must be between -180 and 180, latitude between -90 and 90",
            ),
            Some(_) => {}
        }
        errors.text(
            &self.address,
            "Station address is required",
            200,
            "Address cannot exceed 200 characters",
        );
        errors.text(
            &self.city,
            "City is required",
            50,
            "City name cannot exceed 50 characters",
        );
        errors
    }
}

/// Geo-query result: a trimmed station plus a human-readable distance
#[derive(Debug, Clone, Serialize)]
pub struct NearbyStation {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub distance: String,
}
