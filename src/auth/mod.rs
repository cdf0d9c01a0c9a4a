//! Authentication Module
//! Mission: Accounts, session tokens, role gates and the password lifecycle

pub mod api;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod tokens;
pub mod user_store;

pub use mailer::Mailer;
pub use middleware::{auth_middleware, require_role};
pub use models::{Identity, User, UserRole};
pub use tokens::TokenService;
pub use user_store::UserStore;
