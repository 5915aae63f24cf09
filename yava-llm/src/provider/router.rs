//! Model router - one alias, several deployments
//!
//! The same model is often deployed in more than one region. The router
//! exposes them under a single alias, starts each request at the next
//! deployment in round-robin order and falls over to the following one when
//! a deployment fails with a retryable error (network, rate limit, 5xx).

use super::*;
use crate::error;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin router with failover over deployments of one model alias
pub struct RouterProvider<P> {
    alias: String,
    deployments: Vec<P>,
    next: AtomicUsize,
}

impl<P: LlmProvider> RouterProvider<P> {
    pub fn new(alias: impl Into<String>, deployments: Vec<P>) -> error::Result<Self> {
        let alias = alias.into();
        if deployments.is_empty() {
            return Err(error::no_deployments(alias));
        }
        Ok(Self {
            alias,
            deployments,
            next: AtomicUsize::new(0),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn deployments(&self) -> &[P] {
        &self.deployments
    }
}

impl<P: LlmProvider> LlmProvider for RouterProvider<P> {
    fn name(&self) -> &str {
        "router"
    }

    fn default_model(&self) -> &str {
        &self.alias
    }

    async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        // The alias is ours; each deployment substitutes its own model name.
        if request.model.as_deref() == Some(self.alias.as_str()) {
            request.model = None;
        }

        let count = self.deployments.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % count;

        let mut attempt = 0;
        loop {
            let index = (start + attempt) % count;
            let deployment = &self.deployments[index];

            match deployment.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < count => {
                    tracing::warn!(
                        alias = %self.alias,
                        deployment = index,
                        provider = deployment.name(),
                        error = %e,
                        "deployment failed, trying next"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
