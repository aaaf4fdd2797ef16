//! Error types and handling for texshuttle

use crate::protocol::JobStatus;

/// Result type alias for texshuttle operations
pub type Result<T> = std::result::Result<T, ShuttleError>;

/// Error types for the texture offload core
#[derive(Debug, thiserror::Error)]
pub enum ShuttleError {
    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Shared region creation, opening or bounds failures
    #[error("Region error ({name}): {message}")]
    Region { name: String, message: String },

    /// Control channel is dead: closed peer, short transfer, socket failure
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Invalid parameters rejected before any side effect
    #[error("Invalid parameter: {parameter} - {message}")]
    Validation { parameter: String, message: String },

    /// Job failure reported by the codec pipeline, carries the wire status
    #[error("Codec error ({status:?}): {message}")]
    Codec { status: JobStatus, message: String },

    /// Start requested while a live worker instance exists
    #[error("Worker process is already running")]
    ProcessAlreadyRunning,

    /// Stop or query requested with no live worker instance
    #[error("Worker process is not running")]
    ProcessNotRunning,

    /// The worker executable could not be spawned
    #[error("Cannot start worker process: {message}")]
    CannotStartProcess {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Service disposal refused while buffers are still registered
    #[error("Cannot dispose: {count} handle(s) still outstanding")]
    OutstandingHandles { count: usize },
}

impl ShuttleError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a region error
    pub fn region(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Region {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a codec error carrying its wire status code
    pub fn codec(status: JobStatus, message: impl Into<String>) -> Self {
        Self::Codec {
            status,
            message: message.into(),
        }
    }

    /// Create a spawn failure error
    pub fn cannot_start(message: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::CannotStartProcess {
            message: message.into(),
            source,
        }
    }

    /// Status code to report in a job response for this error
    pub fn job_status(&self) -> JobStatus {
        match self {
            Self::Codec { status, .. } => *status,
            Self::Validation { .. } => JobStatus::BadParameters,
            _ => JobStatus::Unknown,
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for ShuttleError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ShuttleError::region("input", "backing too small");
        assert!(matches!(err, ShuttleError::Region { .. }));

        let err = ShuttleError::transport("short read");
        assert!(matches!(err, ShuttleError::Transport { .. }));

        let err = ShuttleError::codec(JobStatus::DecodeFailed, "truncated container");
        assert_eq!(err.job_status(), JobStatus::DecodeFailed);
    }

    #[test]
    fn test_error_display() {
        let err = ShuttleError::validation("input_len", "exceeds region capacity");
        let display = format!("{}", err);
        assert!(display.contains("Invalid parameter"));
        assert!(display.contains("input_len"));
    }

    #[test]
    fn test_job_status_mapping() {
        assert_eq!(
            ShuttleError::validation("quality", "out of range").job_status(),
            JobStatus::BadParameters
        );
        assert_eq!(
            ShuttleError::transport("peer closed").job_status(),
            JobStatus::Unknown
        );
    }
}
