//! # yava-error
//!
//! The error type shared by every yava crate.
//!
//! An [`Error`] answers three questions for whoever ends up holding it:
//! what went wrong ([`ErrorKind`]), whether trying again could help
//! ([`ErrorStatus`]) and where it happened (operation chain plus context).
//!
//! ```rust
//! use yava_error::{Error, ErrorKind, Result};
//!
//! fn seed_topic(topic: Option<&str>) -> Result<String> {
//!     topic
//!         .map(str::to_string)
//!         .ok_or_else(|| Error::config_invalid("topic is required")
//!             .with_operation("reflection::initialize"))
//! }
//!
//! let err = seed_topic(None).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
//! assert!(!err.is_retryable());
//! ```
//!
//! Foreign errors are wrapped with [`Error::set_source`]; code further up
//! only adds operations and context, it does not re-wrap.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

pub type Result<T> = std::result::Result<T, Error>;
