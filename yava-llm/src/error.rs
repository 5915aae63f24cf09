//! Provider error conversions
//!
//! Re-exports yava-error and adds constructors used by the HTTP providers.

pub use yava_error::{Error, ErrorKind, ErrorStatus, Result};

/// Create an error for an HTTP client that could not be built
pub fn client_build_failed(provider: &'static str, source: reqwest::Error) -> Error {
    Error::new(ErrorKind::ConfigInvalid, "failed to create HTTP client")
        .with_operation("provider::new")
        .with_context("provider", provider)
        .set_source(source)
}

/// Create an error for a router with nothing to route to
pub fn no_deployments(alias: impl Into<String>) -> Error {
    let alias = alias.into();
    Error::config_invalid(format!("model alias '{}' has no deployments", alias))
        .with_operation("router::new")
        .with_context("alias", alias)
}

/// Create an error for a missing environment variable
pub fn missing_env(var: &'static str) -> Error {
    Error::config_invalid(format!("environment variable {} is not set", var))
        .with_operation("provider::from_env")
        .with_context("var", var)
}
