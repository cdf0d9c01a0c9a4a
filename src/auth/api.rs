//! Authentication API Endpoints
//! Mission: Registration, login, profile and password lifecycle

use crate::app::AppState;
use crate::auth::{
    mailer::OutgoingMail,
    middleware::{LOGGED_OUT, SESSION_COOKIE},
    models::{
        validate_password, ForgotPasswordRequest, Identity, LoginRequest, RegisterRequest,
        ResetPasswordRequest, TokenResponse, UpdateDetailsRequest, UpdatePasswordRequest, User,
        UserRole, UserSummary,
    },
    tokens::TokenService,
};
use crate::errors::{duplicate_field, ApiError};
use crate::validation::FieldErrors;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar},
    WithRejection,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};

type TokenReply = (StatusCode, CookieJar, Json<TokenResponse>);
type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<RegisterRequest>,
) -> Result<TokenReply, ApiError> {
    payload.validate().into_result()?;

    if state.users.get_user_by_email(&payload.email)?.is_some() {
        return Err(ApiError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }

    let user = state
        .users
        .create_user(&payload.name, &payload.email, &payload.password, UserRole::User)
        .map_err(|e| email_taken(e, &payload.email))?;

    info!("Registered user {}", user.id);

    token_response(
        &state,
        &headers,
        jar,
        &user,
        StatusCode::CREATED,
        "User registered successfully",
    )
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<LoginRequest>,
) -> Result<TokenReply, ApiError> {
    let (Some(email), Some(password)) = (
        payload.email.filter(|e| !e.trim().is_empty()),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "Please provide an email and password".to_string(),
        ));
    };

    // Same error for unknown email and wrong password
    let Some(user) = state.users.authenticate(&email, &password)? else {
        warn!("Failed login attempt for {}", email);
        return Err(ApiError::invalid_credentials());
    };

    state.users.record_login(&user.id)?;
    info!("Login successful: {} ({})", user.id, user.role.as_str());

    token_response(&state, &headers, jar, &user, StatusCode::OK, "Login successful")
}

/// Logout endpoint - GET /api/auth/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let cookie = Cookie::build((SESSION_COOKIE, LOGGED_OUT))
        .path("/")
        .http_only(true)
        .expires(time::OffsetDateTime::now_utc() + time::Duration::seconds(10));

    (
        jar.add(cookie),
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
}

/// Current user - GET /api/auth/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    let user = load_user(&state, &identity)?;
    Ok(Json(json!({ "success": true, "data": user })))
}

/// Update name/email - PATCH /api/auth/updatedetails
pub async fn update_details(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(payload), _): JsonBody<UpdateDetailsRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.password.is_some() {
        return Err(ApiError::BadRequest(
            "Password can not be updated by this route".to_string(),
        ));
    }

    payload.validate().into_result()?;

    let user = state
        .users
        .update_details(
            &identity.user_id,
            payload.name.as_deref(),
            payload.email.as_deref(),
        )
        .map_err(|e| email_taken(e, payload.email.as_deref().unwrap_or_default()))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "User details updated successfully",
        "data": user,
    })))
}

/// Change password - PATCH /api/auth/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<UpdatePasswordRequest>,
) -> Result<TokenReply, ApiError> {
    let user = load_user(&state, &identity)?;

    if !state.users.check_password(&user, &payload.current_password)? {
        return Err(ApiError::InvalidCredentials(
            "Current password is incorrect".to_string(),
        ));
    }

    if payload.name.is_some() || payload.email.is_some() {
        return Err(ApiError::BadRequest(
            "this route is for password only".to_string(),
        ));
    }

    let mut errors = FieldErrors::new();
    validate_password(&mut errors, &payload.new_password);
    errors.into_result()?;

    state.users.set_password(&user.id, &payload.new_password)?;

    token_response(
        &state,
        &headers,
        jar,
        &user,
        StatusCode::OK,
        "Password updated successfully",
    )
}

/// Request a reset link - POST /api/auth/forgotpassword
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(payload), _): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .users
        .get_user_by_email(&payload.email)?
        .ok_or_else(|| ApiError::NotFound("There is no user with that email".to_string()))?;

    let reset = state.tokens.create_reset_token();
    state
        .users
        .set_reset_token(&user.id, &reset.hashed, reset.expires_at)?;

    let reset_url = format!(
        "{}://{}/api/auth/resetpassword/{}",
        request_scheme(&headers),
        request_host(&headers, &state.config.bind_addr),
        reset.plain
    );

    let mail = OutgoingMail {
        to: user.email.clone(),
        subject: "Password reset token".to_string(),
        body: format!(
            "You are receiving this email because you (or someone else) has requested the reset of a password. Please make a PATCH request to: \n\n {}",
            reset_url
        ),
    };

    if let Err(e) = state.mailer.send(mail).await {
        error!("Reset email to user {} failed: {:?}", user.id, e);
        state.users.clear_reset_token(&user.id)?;
        return Err(ApiError::ServiceUnavailable(
            "Email could not be sent".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true, "message": "Email sent successfully" })))
}

/// Consume a reset token - PATCH /api/auth/resetpassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<ResetPasswordRequest>,
) -> Result<TokenReply, ApiError> {
    let hashed = TokenService::hash_for_lookup(&token);

    let now = Utc::now();

    // Unknown tokens fail before the password is looked at
    state
        .users
        .find_by_reset_token(&hashed, now)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let mut errors = FieldErrors::new();
    validate_password(&mut errors, &payload.password);
    errors.into_result()?;

    // A concurrent reset with the same token may have won since the lookup
    let user = state
        .users
        .consume_reset_token(&hashed, now, &payload.password)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;
    info!("Password reset completed for user {}", user.id);

    token_response(
        &state,
        &headers,
        jar,
        &user,
        StatusCode::OK,
        "Password reset successful",
    )
}

fn load_user(state: &AppState, identity: &Identity) -> Result<User, ApiError> {
    state
        .users
        .get_user_by_id(&identity.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Unique violations on email get the field-specific message
fn email_taken(err: anyhow::Error, email: &str) -> ApiError {
    match duplicate_field(&err).as_deref() {
        Some("email") => ApiError::DuplicateKey(format!("Email {} is already registered", email.trim())),
        _ => ApiError::from(err),
    }
}

/// Issue a token, set the session cookie and build the response
fn token_response(
    state: &AppState,
    headers: &HeaderMap,
    jar: CookieJar,
    user: &User,
    status: StatusCode,
    message: &str,
) -> Result<TokenReply, ApiError> {
    let token = state.tokens.issue(user.id, user.role)?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(request_scheme(headers) == "https")
        .expires(
            time::OffsetDateTime::now_utc()
                + time::Duration::days(state.config.jwt.cookie_expires_days),
        );

    Ok((
        status,
        jar.add(cookie),
        Json(TokenResponse {
            success: true,
            token,
            message: message.to_string(),
            data: UserSummary::from_user(user),
        }),
    ))
}

fn request_scheme(headers: &HeaderMap) -> &'static str {
    match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    }
}

fn request_host(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_scheme(&headers), "http");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        assert_eq!(request_scheme(&headers), "https");
    }

    #[test]
    fn test_request_host_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_host(&headers, "0.0.0.0:3000"), "0.0.0.0:3000");

        headers.insert(header::HOST, HeaderValue::from_static("stations.example.com"));
        assert_eq!(
            request_host(&headers, "0.0.0.0:3000"),
            "stations.example.com"
        );
    }

    #[test]
    fn test_email_taken_mapping() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE users (email TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO users (email) VALUES ('a@b.io')", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO users (email) VALUES ('a@b.io')", [])
            .unwrap_err();

        match email_taken(err.into(), " a@b.io ") {
            ApiError::DuplicateKey(msg) => assert_eq!(msg, "Email a@b.io is already registered"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            email_taken(anyhow::anyhow!("boom"), "a@b.io"),
            ApiError::Internal(_)
        ));
    }
}
