//! What went wrong, independent of where

use std::fmt;

/// Classification of an [`Error`](crate::Error).
///
/// Handling code branches on the kind: a `ConfigInvalid` run fails the same
/// way every time, a `RateLimited` one may well succeed a minute later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Catch-all for failures nobody classified
    Unexpected,
    /// Operation not available in this context
    Unsupported,
    /// Bad configuration, or mandatory input such as a topic missing
    ConfigInvalid,
    /// A caller passed a value the callee cannot work with
    InvalidArgument,

    /// A writer, reviewer or checker capability failed
    CapabilityFailed,
    /// The prompt store has no template under the requested name
    PromptNotFound,

    /// The model call failed for a reason other than the ones below
    InferenceFailed,
    /// The provider answered with a server error or not at all
    ProviderUnavailable,
    /// Too many requests
    RateLimited,
    /// Credentials missing or rejected
    AuthenticationFailed,

    FileNotFound,
    PermissionDenied,
    /// Any other filesystem failure
    IoFailed,
    /// Connection refused, reset or timed out
    NetworkFailed,

    /// Model or server output could not be understood
    ParseFailed,
    /// A document (YAML, JSON) did not match the expected shape
    SerializationFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            Unexpected => "Unexpected",
            Unsupported => "Unsupported",
            ConfigInvalid => "ConfigInvalid",
            InvalidArgument => "InvalidArgument",
            CapabilityFailed => "CapabilityFailed",
            PromptNotFound => "PromptNotFound",
            InferenceFailed => "InferenceFailed",
            ProviderUnavailable => "ProviderUnavailable",
            RateLimited => "RateLimited",
            AuthenticationFailed => "AuthenticationFailed",
            FileNotFound => "FileNotFound",
            PermissionDenied => "PermissionDenied",
            IoFailed => "IoFailed",
            NetworkFailed => "NetworkFailed",
            ParseFailed => "ParseFailed",
            SerializationFailed => "SerializationFailed",
        }
    }

    /// Kinds that start out as [`ErrorStatus::Temporary`](crate::ErrorStatus::Temporary)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InferenceFailed | Self::NetworkFailed | Self::RateLimited | Self::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
