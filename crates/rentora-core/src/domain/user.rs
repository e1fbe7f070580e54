//! User profile as seen by the notification layer.

use serde::{Deserialize, Serialize};

use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Renter,
    Owner,
    Admin,
}

/// Contact details and role of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub push_tokens: Vec<String>,
    pub role: UserRole,
}

impl User {
    #[must_use]
    pub fn new(display_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            email: None,
            phone: None,
            push_tokens: Vec::new(),
            role,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_tokens.push(token.into());
        self
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
