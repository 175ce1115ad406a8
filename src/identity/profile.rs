use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Account role as reported by the backend. Strings other than the three known roles are
/// kept verbatim so a newer backend cannot break profile decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Student,
    Lecturer,
    Admin,
    Unknown(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "STUDENT",
            Role::Lecturer => "LECTURER",
            Role::Admin => "ADMIN",
            Role::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_known(&self) -> bool { !matches!(self, Role::Unknown(_)) }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "STUDENT" => Role::Student,
            "LECTURER" => Role::Lecturer,
            "ADMIN" => Role::Admin,
            other => Role::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self { Role::from(s.as_str()) }
}

impl From<Role> for String {
    fn from(r: Role) -> Self { r.as_str().to_string() }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

fn approved_by_default() -> bool { true }

/// Authenticated user as returned by `/api/auth/me/` and the login endpoint.
/// Replaced wholesale on every fetch, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default = "approved_by_default")]
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn new<S: Into<String>>(id: u64, username: S, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: None,
            role,
            is_approved: true,
            email: None,
            first_name: None,
            last_name: None,
        }
    }

    /// Name used in greetings: first name, then full name, then username.
    pub fn display_name(&self) -> &str {
        [self.first_name.as_deref(), self.full_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(self.username.as_str())
    }
}
