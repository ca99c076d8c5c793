use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission level of the sender, ordered from least to most privileged.
///
/// Handlers declare a minimum role; actors below it are skipped during the
/// dispatch walk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Parse a source-provided role string. Unknown values degrade to
    /// [`Role::Member`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" | "administrator" => Self::Admin,
            _ => Self::Member,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

/// Who sent the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    /// Display name; falls back to the id when the source sends none.
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            role: Role::Member,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_is_member_admin_owner() {
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
    }

    #[test]
    fn unknown_role_degrades_to_member() {
        assert_eq!(Role::parse("moderator"), Role::Member);
        assert_eq!(Role::parse("OWNER"), Role::Owner);
        assert_eq!(Role::parse("Administrator"), Role::Admin);
    }

    #[test]
    fn display_name_defaults_to_id() {
        assert_eq!(Actor::new("42").display_name, "42");
    }
}
