//! Complaint API Endpoints
//! Mission: Users file complaints, admins review them

use crate::app::AppState;
use crate::auth::models::Identity;
use crate::complaints::models::NewComplaint;
use crate::errors::ApiError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Submit - POST /api/complaints (role user)
pub async fn create_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(payload), _): WithRejection<Json<NewComplaint>, ApiError>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    payload.validate().into_result()?;

    let complaint = state.complaints.create(&identity.user_id, &payload.message)?;
    info!("Complaint {} filed by user {}", complaint.id, identity.user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": complaint })),
    ))
}

/// Review all - GET /api/complaints (admin)
pub async fn list_complaints(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let complaints = state.complaints.list()?;

    Ok(Json(json!({
        "success": true,
        "count": complaints.len(),
        "data": complaints,
    })))
}

/// Review one - GET /api/complaints/:id (admin)
pub async fn get_complaint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::resource_not_found())?;
    let complaint = state
        .complaints
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound("Complaint not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": complaint })))
}
