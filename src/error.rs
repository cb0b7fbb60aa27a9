//! Error types for channel construction.

use std::fmt;

/// Result type for channel construction.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur while building a channel.
///
/// Failures of individual calls are never mapped into this type; they reach
/// the caller as the `tonic::Status` returned by the call.
#[derive(Debug)]
pub enum ChannelError {
    /// The configuration violates an invariant (empty address, zero size
    /// limit).
    InvalidConfig { reason: String },

    /// The server address is not a valid URI.
    InvalidAddress {
        address: String,
        source: tonic::transport::Error,
    },

    /// The root certificate bytes could not be turned into trust anchors.
    InvalidCertificates { reason: String },

    /// The token cannot be carried in an HTTP header value.
    InvalidToken {
        source: tonic::metadata::errors::InvalidMetadataValue,
    },

    /// The address names a scheme that disagrees with the transport, e.g.
    /// `http://` while root certificates were supplied.
    SchemeMismatch {
        address: String,
        scheme: String,
        expected: &'static str,
    },

    /// I/O error while reading certificate material.
    Io { source: std::io::Error },

    /// The configuration file or environment could not be extracted.
    ConfigLoad { source: Box<figment::Error> },
}

impl ChannelError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        ChannelError::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_certificates(reason: impl Into<String>) -> Self {
        ChannelError::InvalidCertificates {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::InvalidConfig { reason } => {
                write!(f, "Invalid channel configuration: {}", reason)
            }
            ChannelError::InvalidAddress { address, source } => {
                write!(f, "Invalid server address '{}': {}", address, source)
            }
            ChannelError::InvalidCertificates { reason } => {
                write!(f, "Invalid root certificates: {}", reason)
            }
            ChannelError::InvalidToken { source } => write!(f, "Invalid bearer token: {}", source),
            ChannelError::SchemeMismatch {
                address,
                scheme,
                expected,
            } => write!(
                f,
                "Server address '{}' uses scheme '{}' but the channel requires '{}'",
                address, scheme, expected
            ),
            ChannelError::Io { source } => write!(f, "I/O error: {}", source),
            ChannelError::ConfigLoad { source } => {
                write!(f, "Failed to load channel configuration: {}", source)
            }
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::InvalidAddress { source, .. } => Some(source),
            ChannelError::InvalidToken { source } => Some(source),
            ChannelError::Io { source } => Some(source),
            ChannelError::ConfigLoad { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io { source: err }
    }
}

impl From<figment::Error> for ChannelError {
    fn from(err: figment::Error) -> Self {
        ChannelError::ConfigLoad {
            source: Box::new(err),
        }
    }
}

impl From<tonic::metadata::errors::InvalidMetadataValue> for ChannelError {
    fn from(err: tonic::metadata::errors::InvalidMetadataValue) -> Self {
        ChannelError::InvalidToken { source: err }
    }
}
