use std::io;

use thiserror::Error;

/// Failures raised by the Jira transport, the issue and link operations and the validator.
///
/// The set of kinds is closed. `Context` only decorates another error with the
/// operation that failed; use [`TrackerError::kind`] to branch on what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("authentication failed: {message}")]
    Authentication { message: String },
    #[error("{}", not_found_message(resource, key.as_deref()))]
    NotFound {
        resource: String,
        key: Option<String>,
    },
    #[error("{}", rate_limited_message(*retry_after, message))]
    RateLimited { retry_after: u64, message: String },
    #[error("Jira server error (HTTP {status})")]
    Server { status: u16 },
    #[error("{}", validation_message(field, message, details.as_deref()))]
    Validation {
        field: String,
        message: String,
        details: Option<String>,
    },
    #[error("{}", transport_message(*status, messages))]
    Transport {
        status: Option<u16>,
        messages: Vec<String>,
    },
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<TrackerError>,
    },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TrackerError>,
    },
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        TrackerError::Validation {
            field: field.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(
        field: &str,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        TrackerError::Validation {
            field: field.to_string(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        TrackerError::Transport {
            status,
            messages: vec![message.into()],
        }
    }

    /// Wraps the error with a description of the operation that produced it.
    pub fn context(self, context: impl Into<String>) -> Self {
        TrackerError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error with every `Context` layer removed.
    pub fn kind(&self) -> &TrackerError {
        match self {
            TrackerError::Context { source, .. } => source.kind(),
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            TrackerError::RateLimited { .. } | TrackerError::Server { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), TrackerError::NotFound { .. })
    }

    /// Field name when the underlying error is a validation failure.
    #[cfg(test)]
    pub fn validation_field(&self) -> Option<&str> {
        match self.kind() {
            TrackerError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub trait TrackerResultExt<T> {
    fn context_with<F, S>(self, f: F) -> TrackerResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> TrackerResultExt<T> for TrackerResult<T> {
    fn context_with<F, S>(self, f: F) -> TrackerResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.context(f()))
    }
}

fn not_found_message(resource: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{resource} not found: {key}"),
        None => format!("{resource} not found"),
    }
}

fn rate_limited_message(retry_after: u64, message: &str) -> String {
    if retry_after > 0 {
        format!("rate limited: retry after {retry_after} seconds ({message})")
    } else {
        format!("rate limited: {message}")
    }
}

fn validation_message(field: &str, message: &str, details: Option<&str>) -> String {
    match details {
        Some(details) => format!("validation error in {field}: {message} ({details})"),
        None => format!("validation error in {field}: {message}"),
    }
}

fn transport_message(status: Option<u16>, messages: &[String]) -> String {
    let mut out = match status {
        Some(status) => format!("Jira request failed (HTTP {status})"),
        None => "Jira request failed".to_string(),
    };
    if !messages.is_empty() {
        out.push_str(": ");
        out.push_str(&messages.join("; "));
    }
    out
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    IssueTracker(#[from] TrackerError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid input: {0}")]
    Input(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_peels_context_layers() {
        let err = TrackerError::NotFound {
            resource: "issue".to_string(),
            key: Some("PROJ-1".to_string()),
        }
        .context("failed to get issue PROJ-1")
        .context("blocked-by validation failed");

        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "blocked-by validation failed: failed to get issue PROJ-1: issue not found: PROJ-1"
        );
    }

    #[test]
    fn only_rate_limit_and_server_errors_retry() {
        assert!(TrackerError::Server { status: 503 }.is_retryable());
        assert!(
            TrackerError::RateLimited {
                retry_after: 0,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!TrackerError::Authentication { message: String::new() }.is_retryable());
        assert!(!TrackerError::transport(Some(400), "bad request").is_retryable());
        assert!(!TrackerError::validation("summary", "summary is required").is_retryable());

        let exhausted = TrackerError::ExhaustedRetries {
            attempts: 4,
            last: Box::new(TrackerError::Server { status: 500 }),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn validation_message_includes_details() {
        let err = TrackerError::validation_with_details(
            "priority",
            "invalid priority",
            "must be one of: Lowest, Low, Medium, High, Highest",
        );
        assert_eq!(
            err.to_string(),
            "validation error in priority: invalid priority (must be one of: Lowest, Low, Medium, High, Highest)"
        );
        assert_eq!(err.validation_field(), Some("priority"));
    }
}
