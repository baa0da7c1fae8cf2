use std::{io, path::PathBuf};

use http::StatusCode;
use thiserror::Error;

use crate::validator::ValidationReport;

/// Configuration-time validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The storage root path was empty.
    #[error("storage root path cannot be empty")]
    EmptyStorageRoot,
    /// An allowed extension entry was the empty string.
    #[error("allowed extension entries cannot be empty")]
    EmptyExtension,
    /// A configured numeric limit must be strictly greater than zero.
    #[error("limit `{limit}` must be greater than 0")]
    InvalidLimitValue {
        /// Name of the limit.
        limit: &'static str,
    },
    /// The per-file limit exceeded the aggregate limit.
    #[error("limit `max_file_bytes` ({value}) cannot exceed `max_total_bytes` ({max_total_bytes})")]
    LimitExceedsTotalSize {
        /// Configured `max_file_bytes`.
        value: u64,
        /// Configured `max_total_bytes`.
        max_total_bytes: u64,
    },
}

/// Parser-level multipart failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Generic parser failure with message context.
    #[error("{message}")]
    Message {
        /// Parser failure message.
        message: String,
    },
}

impl ParseError {
    /// Creates a parser error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Storage backend failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("failed to {operation} `{}`: {source}", path.display())]
    Io {
        /// Operation that was attempted, for example `create directory`.
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Wraps an I/O failure with the operation and path it concerned.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Runtime error type used by `uploadgear`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The request body is not of the content type the endpoint expects.
    #[error("invalid upload data: {0}")]
    InvalidContentType(ParseError),
    /// One or more validation checks failed.
    #[error("{0}")]
    Rejected(ValidationReport),
    /// A scalar form field exceeded the configured size limit.
    #[error("text field `{field}` exceeded max field size of {max_field_bytes} bytes")]
    FieldTooLarge {
        /// Field name that exceeded the limit.
        field: String,
        /// Maximum allowed scalar field size in bytes.
        max_field_bytes: u64,
    },
    /// The pre-flight JSON body could not be decoded.
    #[error("invalid upload descriptor: {0}")]
    InvalidDescriptor(#[from] serde_json::Error),
    /// The request body was already taken by an earlier stage.
    #[error("request body was already consumed")]
    BodyConsumed,
    /// Multipart stream ended before a complete terminal boundary.
    #[error("multipart stream ended unexpectedly")]
    IncompleteStream,
    /// Multipart framing failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Storage backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Configuration error surfaced at runtime.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl UploadError {
    pub(crate) fn invalid_content_type(message: impl Into<String>) -> Self {
        Self::InvalidContentType(ParseError::new(message))
    }

    /// Returns the validation report when this error is a validation rejection.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Rejected(report) => Some(report),
            _ => None,
        }
    }

    /// HTTP status a host should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidContentType(_) | Self::Rejected(_) | Self::FieldTooLarge { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvalidDescriptor(_) | Self::IncompleteStream | Self::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::BodyConsumed | Self::Storage(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
