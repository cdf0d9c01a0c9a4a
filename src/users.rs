//! User Administration API
//! Mission: Admin listing of accounts with search, filters, sorting and pagination

use crate::app::AppState;
use crate::auth::{
    models::UserRole,
    user_store::{UserFilter, UserSort},
};
use crate::errors::ApiError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl UserListQuery {
    /// Clamp paging and resolve role/sort into a store filter
    pub fn into_filter(self) -> Result<(UserFilter, u32, u32), ApiError> {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let role = match self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                UserRole::from_str(raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("Invalid role: {}", raw)))?,
            ),
            None => None,
        };

        let sort = match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => UserSort::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid sort field: {}", raw)))?,
            None => UserSort::default(),
        };

        let filter = UserFilter {
            search: self.search,
            role,
            is_active: self.is_active,
            sort,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };

        Ok((filter, page, limit))
    }
}

pub fn page_count(total: u64, limit: u32) -> u64 {
    total.div_ceil(u64::from(limit.max(1)))
}

/// List users - GET /api/users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<UserListQuery>, ApiError>,
) -> Result<Json<Value>, ApiError> {
    let (filter, page, limit) = query.into_filter()?;
    let (users, total) = state.users.list_users(&filter)?;
    let pagination = Pagination {
        page,
        limit,
        pages: page_count(total, limit),
    };

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "total": total,
        "pagination": pagination,
        "data": users,
    })))
}

/// One user - GET /api/users/:id (admin)
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::resource_not_found())?;
    let user = state
        .users
        .get_user_by_id(&id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": user })))
}
