//! Station API Endpoints
//! Mission: Station reads for every session, writes for admins, and the nearest lookup

use crate::app::AppState;
use crate::auth::models::{Identity, UserRole};
use crate::errors::ApiError;
use crate::stations::{
    geo::find_nearest,
    models::{valid_latitude, valid_longitude, GeoPoint, StationDraft, StationInput, Visibility},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

type JsonBody<T> = WithRejection<Json<T>, ApiError>;
type QueryParams<T> = WithRejection<Query<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationQuery {
    pub name: Option<String>,
    pub include_inactive: Option<bool>,
}

/// The inactive bypass is honored for admins only
fn visibility_for(identity: &Identity, include_inactive: Option<bool>) -> Visibility {
    match (identity.role, include_inactive) {
        (UserRole::Admin, Some(true)) => Visibility::All,
        _ => Visibility::ActiveOnly,
    }
}

fn parse_station_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::resource_not_found())
}

fn station_not_found() -> ApiError {
    ApiError::NotFound("Station not found".to_string())
}

/// Parse `"<lng>,<lat>"` into a validated point
pub fn parse_coordinates(raw: &str) -> Result<GeoPoint, ApiError> {
    let invalid = || {
        ApiError::BadRequest(
            "Please provide valid coordinates in the format longitude,latitude".to_string(),
        )
    };

    let (lng, lat) = raw.split_once(',').ok_or_else(invalid)?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;

    if !valid_longitude(lng) || !valid_latitude(lat) {
        return Err(invalid());
    }
    Ok(GeoPoint::new(lng, lat))
}

/// List stations - GET /api/stations
pub async fn list_stations(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Query(query), _): QueryParams<StationQuery>,
) -> Result<Json<Value>, ApiError> {
    let stations = state
        .stations
        .list(visibility_for(&identity, query.include_inactive))?;

    Ok(Json(json!({
        "success": true,
        "count": stations.len(),
        "data": stations,
    })))
}

/// Search by name - GET /api/stations/search?name=
pub async fn search_stations(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Query(query), _): QueryParams<StationQuery>,
) -> Result<Json<Value>, ApiError> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please provide a name to search for".to_string()))?;

    let stations = state
        .stations
        .search_by_name(name, visibility_for(&identity, query.include_inactive))?;

    Ok(Json(json!({
        "success": true,
        "count": stations.len(),
        "data": stations,
    })))
}

/// One station - GET /api/stations/:id
pub async fn get_station(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    WithRejection(Query(query), _): QueryParams<StationQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_station_id(&id)?;
    let station = state
        .stations
        .get(&id, visibility_for(&identity, query.include_inactive))?
        .ok_or_else(station_not_found)?;

    Ok(Json(json!({ "success": true, "data": station })))
}

/// Nearest active stations - GET /api/stations/nearest/:lng,:lat
pub async fn nearest_stations(
    State(state): State<AppState>,
    Path(coords): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let center = parse_coordinates(&coords)?;
    let stations = find_nearest(&state.stations, &center)?;

    Ok(Json(json!({
        "success": true,
        "count": stations.len(),
        "data": stations,
    })))
}

/// Create - POST /api/stations (admin)
pub async fn create_station(
    State(state): State<AppState>,
    WithRejection(Json(input), _): JsonBody<StationInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let draft = StationDraft::from_input(input);
    draft.validate().into_result()?;

    let station = state.stations.create(&draft)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": station })),
    ))
}

/// Partial update - PATCH /api/stations/:id (admin)
pub async fn update_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(patch), _): JsonBody<StationInput>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_station_id(&id)?;
    let existing = state
        .stations
        .get(&id, Visibility::All)?
        .ok_or_else(station_not_found)?;

    let draft = StationDraft::merged(&existing, patch);
    draft.validate().into_result()?;

    let station = state
        .stations
        .update(&id, &draft)?
        .ok_or_else(station_not_found)?;
    info!("Updated station {}", station.id);

    Ok(Json(json!({ "success": true, "data": station })))
}

/// Delete - DELETE /api/stations/:id (admin)
pub async fn delete_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_station_id(&id)?;
    if !state.stations.delete(&id)? {
        return Err(station_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "message": "Station deleted successfully",
        "data": {},
    })))
}
