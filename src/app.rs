//! Application Wiring
//! Mission: Shared state, route table and the middleware stack around it

use crate::auth::{
    api as auth_api, auth_middleware, mailer::Mailer, models::UserRole, require_role,
    TokenService, UserStore,
};
use crate::complaints::{api as complaints_api, ComplaintStore};
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::middleware::{
    error_diagnostics, rate_limit_middleware, request_logging, RateLimitConfig, RateLimiter,
};
use crate::stations::{api as stations_api, StationStore};
use crate::users;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, patch, post, MethodRouter},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<UserStore>,
    pub stations: Arc<StationStore>,
    pub complaints: Arc<ComplaintStore>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Open the stores (creating tables as needed) and build the token service
    pub fn new(config: AppConfig, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let db_path = config.database_path.as_str();

        // Users first: complaints join against the users table
        let users = UserStore::new(db_path, config.bcrypt_cost)
            .context("Failed to initialize user store")?;
        let stations = StationStore::new(db_path).context("Failed to initialize station store")?;
        let complaints =
            ComplaintStore::new(db_path).context("Failed to initialize complaint store")?;
        let tokens = TokenService::new(&config.jwt.secret, config.jwt.expire)
            .context("Failed to initialize token service")?;
        let limiter = RateLimiter::new(RateLimitConfig::from(&config.rate_limit));

        info!("Stores initialized at {}", db_path);

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            users: Arc::new(users),
            stations: Arc::new(stations),
            complaints: Arc::new(complaints),
            mailer,
            limiter,
        })
    }
}

/// Liveness - GET /api/health
async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn admin_only(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(UserRole::Admin, require_role))
}

fn user_only(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(UserRole::User, require_role))
}

/// Assemble the full HTTP application
pub fn build_router(state: AppState) -> Router {
    // No session required
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/logout", get(auth_api::logout))
        .route("/auth/forgotpassword", post(auth_api::forgot_password))
        .route("/auth/resetpassword/:token", patch(auth_api::reset_password));

    // Any signed-in account; role gates sit on individual methods so a
    // shared path still answers 405 for methods it does not serve
    let protected_routes = Router::new()
        .route("/auth/me", get(auth_api::get_me))
        .route("/auth/updatedetails", patch(auth_api::update_details))
        .route("/auth/updatepassword", patch(auth_api::update_password))
        .route(
            "/stations",
            get(stations_api::list_stations).merge(admin_only(post(stations_api::create_station))),
        )
        .route("/stations/search", get(stations_api::search_stations))
        .route(
            "/stations/nearest/:coords",
            get(stations_api::nearest_stations),
        )
        .route(
            "/stations/:id",
            get(stations_api::get_station).merge(admin_only(
                patch(stations_api::update_station).delete(stations_api::delete_station),
            )),
        )
        .route(
            "/complaints",
            admin_only(get(complaints_api::list_complaints))
                .merge(user_only(post(complaints_api::create_complaint))),
        )
        .route(
            "/complaints/:id",
            admin_only(get(complaints_api::get_complaint)),
        )
        .route("/users", admin_only(get(users::list_users)))
        .route("/users/:id", admin_only(get(users::get_user)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = public_routes
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    let environment = state.config.environment;

    Router::new()
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn_with_state(
            environment,
            error_diagnostics,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
