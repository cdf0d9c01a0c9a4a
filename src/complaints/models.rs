//! Complaint Models

use crate::auth::models::UserSummary;
use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_MESSAGE_LEN: usize = 500;

/// A complaint with its submitter resolved; `user` is `None` if the account is gone
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewComplaint {
    #[serde(default)]
    pub message: String,
}

impl NewComplaint {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.text(
            &self.message,
            "Complaint message is required",
            MAX_MESSAGE_LEN,
            "Complaint cannot exceed 500 characters",
        );
        errors
    }
}
