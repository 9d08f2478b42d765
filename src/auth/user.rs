use serde::{Deserialize, Serialize};

/// Stored account record.
///
/// Deliberately not `Serialize`: the password hash must never reach a
/// response body. Use [`User::summary`] for anything client-facing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Opaque stable identifier
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Unique, compared case-sensitively
    pub email: String,
    pub password_hash: String,
}

impl User {
    /// Creates a user record with a freshly generated id
    pub fn new(first_name: String, last_name: String, email: String, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            password_hash,
        }
    }

    /// "First Last", as carried in the access token
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// First letter of each name
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public view of a freshly created user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
}

/// Identity established by the auth gate for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub email: String,
}
