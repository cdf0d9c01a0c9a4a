//! Field Validation
//! Mission: Check records before they reach the database and report every problem at once

use crate::errors::ApiError;
use regex::Regex;
use std::sync::OnceLock;

/// Accumulates field-level messages for a single record
#[derive(Debug, Default)]
pub struct FieldErrors {
    messages: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Required, non-blank text with an upper length bound (in characters)
    pub fn text(&mut self, value: &str, required_msg: &str, max: usize, max_msg: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.push(required_msg);
        } else if trimmed.chars().count() > max {
            self.push(max_msg);
        }
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.messages))
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}
