//! Error types for pipeline operations.
//!
//! Every failure a caller can observe is a [`PipelineError`]. Callers branch
//! on [`ErrorKind`] rather than on status codes or message text.

use std::fmt;
use thiserror::Error;

/// Sentinel reported when a pipeline does not exist.
///
/// This is the `Display` form of [`PipelineError::NotFound`], kept stable for
/// callers that still compare error strings.
pub const NO_SUCH_ENTITY: &str = "NoSuchEntityException";

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The remote action a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Saving a new pipeline.
    Create,
    /// Reading a pipeline configuration.
    Get,
    /// Replacing a pipeline by id.
    Update,
    /// Removing a pipeline.
    Delete,
}

impl Action {
    /// Returns the progressive form used in error messages.
    #[must_use]
    pub const fn gerund(self) -> &'static str {
        match self {
            Self::Create => "saving",
            Self::Get => "getting",
            Self::Update => "updating",
            Self::Delete => "deleting",
        }
    }

    /// Returns the lowercase action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The pipeline does not exist.
    NotFound,
    /// The service kept failing with retryable outcomes until retries ran out.
    Transient,
    /// The service gave a final answer other than success.
    Terminal,
    /// A document could not be converted to or from JSON locally.
    Decode,
}

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested pipeline does not exist.
    #[error("{}", NO_SUCH_ENTITY)]
    NotFound {
        /// Application the pipeline was looked up in.
        application: String,
        /// Pipeline name.
        pipeline: String,
        /// Status of the lookup response: 404, or the success status of a
        /// response that carried no document.
        status: Option<u16>,
    },

    /// Retryable failures persisted through every attempt.
    #[error("Encountered an error {} pipeline, {}: {message}", .action.gerund(), status_text(.status))]
    Transient {
        /// The failing action.
        action: Action,
        /// Last observed status code, if a response was received.
        status: Option<u16>,
        /// Transport error text or a status summary.
        message: String,
    },

    /// A non-retryable failure.
    #[error("Encountered an error {} pipeline, {}: {message}", .action.gerund(), status_text(.status))]
    Terminal {
        /// The failing action.
        action: Action,
        /// Observed status code, if a response was received.
        status: Option<u16>,
        /// Transport error text or a status summary.
        message: String,
    },

    /// A pipeline document could not be encoded or decoded.
    #[error("Failed to decode pipeline document during {action}: {source}")]
    Decode {
        /// The action during which the conversion failed.
        action: Action,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

fn status_text(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status code: {code}"),
        None => "no response".to_string(),
    }
}

impl PipelineError {
    /// Creates a not-found error with the status the lookup observed.
    #[must_use]
    pub fn not_found(
        application: impl Into<String>,
        pipeline: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::NotFound {
            application: application.into(),
            pipeline: pipeline.into(),
            status,
        }
    }

    /// Creates a transient error.
    #[must_use]
    pub fn transient(action: Action, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            action,
            status,
            message: message.into(),
        }
    }

    /// Creates a terminal error.
    #[must_use]
    pub fn terminal(action: Action, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Terminal {
            action,
            status,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub const fn decode(action: Action, source: serde_json::Error) -> Self {
        Self::Decode { action, source }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Terminal { .. } => ErrorKind::Terminal,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Returns true for the "no such entity" condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the failure came from exhausted retries.
    ///
    /// A caller may try the whole operation again later; the crate itself
    /// never retries beyond its fixed ceiling.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the observed status code, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { status, .. }
            | Self::Transient { status, .. }
            | Self::Terminal { status, .. } => *status,
            Self::Decode { .. } => None,
        }
    }

    /// Returns the action the error is attributed to.
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::NotFound { .. } => Action::Get,
            Self::Transient { action, .. }
            | Self::Terminal { action, .. }
            | Self::Decode { action, .. } => *action,
        }
    }
}
