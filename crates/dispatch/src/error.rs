use {switchyard_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("handler already registered: {name}")]
    HandlerExists { name: String },

    #[error("handler not found: {name}")]
    HandlerNotFound { name: String },

    #[error(transparent)]
    InvalidTrigger(#[from] regex::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn handler_exists(name: impl Into<String>) -> Self {
        Self::HandlerExists { name: name.into() }
    }

    #[must_use]
    pub fn handler_not_found(name: impl Into<String>) -> Self {
        Self::HandlerNotFound { name: name.into() }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

switchyard_common::impl_context!();
