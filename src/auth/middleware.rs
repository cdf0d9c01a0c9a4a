//! Authentication Middleware
//! Mission: Protect API endpoints with session token validation and role gates

use crate::app::AppState;
use crate::auth::{
    models::{Identity, UserRole},
    tokens::TokenError,
};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "jwt";
/// Value written to the session cookie on logout
pub const LOGGED_OUT: &str = "loggedout";

/// Pull a session token from `Authorization: Bearer` or, failing that, the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty() && v != LOGGED_OUT)
    })
}

/// Auth middleware: verify the token, load the user it names, attach their identity
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or_else(|| {
        debug!("Rejected {}: no session token", req.uri().path());
        ApiError::unauthorized()
    })?;

    let claimed = state.tokens.verify(&token).map_err(|e| {
        match e {
            TokenError::ExpiredToken => debug!("Rejected session token: expired"),
            TokenError::InvalidToken => warn!("Rejected session token: invalid signature or format"),
        }
        ApiError::unauthorized()
    })?;

    // The role on record wins over the one baked into the token
    let user = state
        .users
        .get_user_by_id(&claimed.user_id)?
        .ok_or_else(|| {
            warn!("Session token for missing user {}", claimed.user_id);
            ApiError::Unauthorized("The user belonging to this token no longer exists".to_string())
        })?;

    req.extensions_mut().insert(Identity {
        user_id: user.id,
        role: user.role,
    });

    Ok(next.run(req).await)
}

/// Exact-match role check. Admins do not satisfy a `user`-only gate.
pub fn authorize(identity: &Identity, required: UserRole) -> Result<(), ApiError> {
    if identity.role == required {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            identity.role.as_str()
        )))
    }
}

/// Role gate middleware; must run inside `auth_middleware`
pub async fn require_role(
    State(required): State<UserRole>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or_else(ApiError::unauthorized)?;

    authorize(identity, required)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    #[test]
    fn test_extract_token_prefers_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=cookie-token"));

        assert_eq!(extract_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=cookie-token"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_extract_token_missing_or_malformed() {
        assert!(extract_token(&HeaderMap::new()).is_none());

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_token(&basic).is_none());

        let mut logged_out = HeaderMap::new();
        logged_out.insert(header::COOKIE, HeaderValue::from_static("jwt=loggedout"));
        assert!(extract_token(&logged_out).is_none());
    }

    #[test]
    fn test_authorize_exact_match() {
        let admin = Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        let user = Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::User,
        };

        assert!(authorize(&admin, UserRole::Admin).is_ok());
        assert!(authorize(&user, UserRole::User).is_ok());

        assert!(matches!(
            authorize(&user, UserRole::Admin),
            Err(ApiError::Forbidden(_))
        ));
        // Not hierarchical
        assert!(matches!(
            authorize(&admin, UserRole::User),
            Err(ApiError::Forbidden(_))
        ));
    }
}
