//! Application Configuration
//! Mission: One explicit settings struct, read from CLI flags or the environment

use clap::{Args, Parser, ValueEnum};
use std::time::Duration;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Top-level settings, passed by value into every component that needs them
#[derive(Debug, Clone, Parser)]
#[command(name = "train-station", about = "Train station REST API")]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "train_station.db")]
    pub database_path: String,

    #[arg(long, env = "APP_ENV", value_enum, default_value = "development")]
    pub environment: Environment,

    /// bcrypt work factor for password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = 12)]
    pub bcrypt_cost: u32,

    #[command(flatten)]
    pub jwt: JwtConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitSettings,

    #[command(flatten)]
    pub mail: MailConfig,

    #[command(flatten)]
    pub admin: AdminBootstrap,
}

/// Session token settings
#[derive(Debug, Clone, Args)]
pub struct JwtConfig {
    #[arg(long = "jwt-secret", env = "JWT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Token lifetime, e.g. `30d`, `12h`, `45m`, `3600s`
    #[arg(long = "jwt-expire", env = "JWT_EXPIRE", default_value = "30d", value_parser = parse_duration)]
    pub expire: Duration,

    /// Session cookie lifetime in days
    #[arg(long = "jwt-cookie-expires-in", env = "JWT_COOKIE_EXPIRES_IN", default_value_t = 30)]
    pub cookie_expires_days: i64,
}

#[derive(Debug, Clone, Args)]
pub struct RateLimitSettings {
    #[arg(long = "rate-limit-window-ms", env = "RATE_LIMIT_WINDOW_MS", default_value_t = 900_000)]
    pub window_ms: u64,

    #[arg(long = "rate-limit-max-requests", env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub max_requests: u32,
}

/// Outbound SMTP settings. Mail is disabled when no host is set.
#[derive(Debug, Clone, Args)]
pub struct MailConfig {
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long = "smtp-user", env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    #[arg(long = "smtp-pass", env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,

    #[arg(
        long = "mail-from",
        env = "MAIL_FROM",
        default_value = "train station admin <admin@train-station.local>"
    )]
    pub from: String,
}

/// Optional admin account created at startup when both email and password are set
#[derive(Debug, Clone, Args)]
pub struct AdminBootstrap {
    #[arg(long = "admin-email", env = "ADMIN_EMAIL")]
    pub email: Option<String>,

    #[arg(long = "admin-password", env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long = "admin-name", env = "ADMIN_NAME", default_value = "Administrator")]
    pub name: String,
}

impl AdminBootstrap {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}

/// Parse a duration such as `30d`, `12h`, `45m`, `90s` or a bare number of seconds
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (digits, unit_secs) = match raw.chars().last() {
        Some('d') => (&raw[..raw.len() - 1], 86_400),
        Some('h') => (&raw[..raw.len() - 1], 3_600),
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('s') => (&raw[..raw.len() - 1], 1),
        _ => (raw, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{}'", raw))?;

    Ok(Duration::from_secs(value * unit_secs))
}
