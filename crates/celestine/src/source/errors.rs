use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to an external feed.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, TLS or protocol failure.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The request did not complete within the client timeout.
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The source answered with a non-2xx status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The client configuration is unusable.
    #[error("Invalid source configuration: {message}")]
    Config { message: String },
}

impl SourceError {
    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures that may succeed on a later attempt.
    ///
    /// A decode failure means the source sent something this client does not
    /// understand; repeating the request will not change that.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Status { .. }
        )
    }
}

impl From<HttpError> for SourceError {
    fn from(err: HttpError) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
