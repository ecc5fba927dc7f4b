use serde::{Deserialize, Serialize};
use std::fmt;

use super::{SpaceType, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Admin => "admin",
        })
    }
}

/// Directory entry for a user. Identity and credentials live with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub department: String,
    /// Space type this user needs, e.g. accessible or electric.
    #[serde(default)]
    pub required_space: Option<SpaceType>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id: UserId::new(id),
            role: UserRole::User,
            department: String::new(),
            required_space: None,
            active: true,
        }
    }

    #[must_use]
    pub fn requiring(mut self, space_type: SpaceType) -> Self {
        self.required_space = Some(space_type);
        self
    }

    /// Case-insensitive match on id, display name or department. An empty term matches all.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || [self.id.as_str(), self.display_name.as_str(), self.department.as_str()]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
    }
}
