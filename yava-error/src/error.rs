use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// Error returned by every fallible yava operation.
///
/// It carries a [`ErrorKind`], a human message and a retry [`ErrorStatus`].
/// Layers that pass the error upwards add the operation they were in and
/// `key: value` context pairs; the original failure, if any, is kept as the
/// source.
///
/// ```rust
/// use yava_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::InferenceFailed, "model returned empty response")
///     .with_operation("generator::generate")
///     .with_context("capability", "writer");
///
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert_eq!(
///     err.to_string(),
///     "InferenceFailed (temporary) at generator::generate [capability=writer]: model returned empty response"
/// );
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Status starts as `Temporary` for retryable kinds and `Permanent` otherwise.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: if kind.is_retryable() {
                ErrorStatus::Temporary
            } else {
                ErrorStatus::Permanent
            },
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Innermost operation is pushed into context as `called` when a new one is set
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// First context value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn temporary(self) -> Self {
        self.with_status(ErrorStatus::Temporary)
    }

    pub fn permanent(self) -> Self {
        self.with_status(ErrorStatus::Permanent)
    }

    /// Retries were attempted and did not help
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            let inner = self.operation;
            self.context.push(("called", inner.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying failure. Setting it twice is a bug (debug assertion).
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "error source set twice");
        self.source = Some(source.into());
        self
    }
}

/// One line, suitable for logs:
/// `Kind (status) at operation [k=v, k=v]: message`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Several lines, one field per line, followed by the source chain
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        writeln!(f)?;
        if !self.message.is_empty() {
            writeln!(f, "  message: {}", self.message)?;
        }
        for (key, value) in &self.context {
            writeln!(f, "  {}: {}", key, value)?;
        }
        if let Some(source) = &self.source {
            for (depth, cause) in source.chain().enumerate() {
                writeln!(f, "  cause[{}]: {}", depth, cause)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::NotFound => ErrorKind::FileNotFound,
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Self::new(kind, err.to_string()).with_operation("io").set_source(err)
    }
}

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Mandatory input missing or configuration out of range
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// An injected capability (writer, reviewer, checker) failed
    pub fn capability_failed(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityFailed, reason).with_context("capability", capability)
    }

    pub fn prompt_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::PromptNotFound, format!("prompt '{}' not found", name))
            .with_context("prompt", name)
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceFailed, message)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }
}
