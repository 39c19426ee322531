use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

use jungle_quest_model::{ErrorKind, ModelProviderError};

/// Errors returned by [`Session`](crate::Session) operations.
#[derive(Debug)]
pub enum Error {
    /// The game has ended, no further turns are accepted.
    Ended,
    /// Another turn is still waiting for the model.
    Busy,
    /// The model did not answer in time.
    Timeout(Duration),
    /// The model provider failed.
    Model(Box<dyn ModelProviderError>),
    /// The session task is gone.
    SessionClosed,
}

impl Error {
    /// Returns the provider error kind if this is a model failure.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Model(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Ended => write!(f, "the game has already ended"),
            Error::Busy => write!(f, "the previous turn is still in progress"),
            Error::Timeout(duration) => {
                write!(f, "the model did not respond within {duration:?}")
            }
            Error::Model(err) => write!(f, "model request failed: {err}"),
            Error::SessionClosed => write!(f, "the session has been closed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Model(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
