use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A reply was attempted on an event with no reply capability attached.
    #[error("event has no reply capability attached")]
    NoReplyCapability,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
