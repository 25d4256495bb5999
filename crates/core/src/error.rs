use std::error::Error as StdError;
use std::fmt::{self, Display};

use tally_agent_model::ModelProviderError;

/// The kind of error that ended an agent invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model provider failed to answer.
    Model,
    /// The model kept requesting tools beyond the turn limit.
    TurnLimitExceeded,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Model => write!(f, "model request failed"),
            ErrorKind::TurnLimitExceeded => write!(f, "turn limit exceeded"),
        }
    }
}

/// Describes why an agent invocation failed.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn ModelProviderError>>,
    reason: Option<String>,
}

impl Error {
    pub(crate) fn model(source: Box<dyn ModelProviderError>) -> Self {
        Self {
            kind: ErrorKind::Model,
            source: Some(source),
            reason: None,
        }
    }

    pub(crate) fn turn_limit_exceeded(max_turns: usize) -> Self {
        Self {
            kind: ErrorKind::TurnLimitExceeded,
            source: None,
            reason: Some(format!("no final answer after {max_turns} turns")),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the kind reported by the model provider, if the model
    /// caused this error.
    #[inline]
    pub fn model_error_kind(&self) -> Option<tally_agent_model::ErrorKind> {
        self.source.as_ref().map(|err| err.kind())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.reason) {
            (Some(source), _) => write!(f, "{}: {source}", self.kind),
            (None, Some(reason)) => write!(f, "{}: {reason}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}
