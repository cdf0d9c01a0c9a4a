//! Authentication Models
//! Mission: Define user records, roles, token claims and auth payloads

use crate::validation::{is_valid_email, FieldErrors};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_NAME_LEN: usize = 50;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>, // sha256 hex of the emailed token
    #[serde(skip_serializing)]
    pub reset_password_expire: Option<i64>, // unix seconds
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[serde(rename = "user")]
    #[default]
    User, // Submits complaints, reads stations
    #[serde(rename = "admin")]
    Admin, // Manages stations, reviews complaints and users
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize, // expiration timestamp
}

/// Authenticated caller, attached to request extensions by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        validate_name(&mut errors, &self.name);
        validate_email(&mut errors, &self.email);
        validate_password(&mut errors, &self.password);
        errors
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Profile update body. `password` is only captured so it can be rejected.
#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateDetailsRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            validate_name(&mut errors, name);
        }
        if let Some(email) = &self.email {
            validate_email(&mut errors, email);
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// Identity summary returned alongside session tokens
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl UserSummary {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Token response envelope
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
    pub data: UserSummary,
}

pub fn validate_name(errors: &mut FieldErrors, name: &str) {
    errors.text(
        name,
        "Name is required",
        MAX_NAME_LEN,
        "Name cannot exceed 50 characters",
    );
}

pub fn validate_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("Email is required");
    } else if !is_valid_email(email) {
        errors.push("Please provide a valid email");
    }
}

pub fn validate_password(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.push("Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 4 characters");
    }
}
