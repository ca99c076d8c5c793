use std::fmt;

/// The conversational unit an event belongs to — a specific group or a
/// specific user/device. Scopes key claim exclusivity: at most one handler
/// may own a scope at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Group(String),
    User(String),
}

impl Scope {
    #[must_use]
    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Group(id) | Self::User(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "group:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
