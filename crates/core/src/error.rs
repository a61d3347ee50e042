//! Error types for refdrop-core.
//!
//! `FetchFailure` is the only error a load ever produces, and it never reaches
//! the host page: it is rendered into a dropdown option instead.

use crate::dom::ElementHandle;
use std::fmt;

/// Coarse classification of a failed fetch, rendered the way the host UI's
/// transport reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStatus {
    /// Network failure or non-success HTTP status.
    Error,
    Timeout,
    /// The body arrived but could not be decoded into a list.
    ParserError,
}

impl fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStatus::Error => "error",
            FailureStatus::Timeout => "timeout",
            FailureStatus::ParserError => "parsererror",
        })
    }
}

/// A failed remote list fetch: status descriptor plus the transport's reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {reason}")]
pub struct FetchFailure {
    pub status: FailureStatus,
    pub reason: String,
}

impl FetchFailure {
    pub fn new(status: FailureStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::new(FailureStatus::Error, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(FailureStatus::Timeout, reason)
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::new(FailureStatus::ParserError, reason)
    }

    /// `"<status>: <reason>"` flattened onto one line, ready to be used as an
    /// option value and label.
    pub fn message(&self) -> String {
        single_line(&self.to_string())
    }
}

/// Replace carriage returns and newlines with spaces.
pub fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {0:?} in selector `{1}`")]
    Unexpected(char, String),
    #[error("expected {0} in selector `{1}`")]
    Expected(&'static str, String),
    #[error("unsupported selector syntax `{0}`")]
    Unsupported(String),
    #[error("unbalanced quotes or parentheses in selector `{0}`")]
    Unbalanced(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("no element at {0:?}")]
    StaleHandle(ElementHandle),
    #[error("element at {handle:?} is a <{tag}>, not a <select>")]
    NotASelect { handle: ElementHandle, tag: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid endpoint URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("field `{0}` has no sources")]
    NoSources(String),
    #[error("invalid repository path segment `{0}`")]
    InvalidRepo(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_single_line() {
        let failure = FetchFailure::error("Bad Gateway\r\n<html>\nupstream</html>");
        let message = failure.message();
        assert!(!message.contains('\n'));
        assert!(!message.contains('\r'));
        assert_eq!(message, "error: Bad Gateway  <html> upstream</html>");
    }

    #[test]
    fn statuses_render_like_the_host_transport() {
        assert_eq!(FetchFailure::timeout("t").to_string(), "timeout: t");
        assert_eq!(FetchFailure::parse("p").to_string(), "parsererror: p");
    }
}
