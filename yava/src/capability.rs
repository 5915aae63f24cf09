//! Capabilities injected into the reflection loop
//!
//! The loop never talks to a model directly. It is handed a writer and a
//! reviewer ([`Generator`]) and a checker ([`Checker`]). Production code
//! backs them with an [`LlmProvider`]; tests back them with scripts.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use yava_error::{Error, ErrorStatus, Result};
use yava_llm::{ChatMessage, CompletionRequest, LlmProvider, ProviderError, UsageTracker};

use crate::prompts::{self, PromptStore};

/// Produces the next turn of a conversation
#[allow(async_fn_in_trait)]
pub trait Generator: Send + Sync {
    async fn generate(&self, transcript: &[ChatMessage]) -> Result<String>;
}

/// Decides synchronously whether a candidate deserves another round.
///
/// Only the text is returned; interpreting it is the caller's business.
pub trait Checker: Send + Sync {
    fn decide(&self, request: &CheckRequest) -> Result<String>;
}

/// Input of a [`Checker`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRequest {
    pub format: String,
    pub topic: String,
    pub essay: String,
}

impl<G: Generator> Generator for &G {
    async fn generate(&self, transcript: &[ChatMessage]) -> Result<String> {
        (**self).generate(transcript).await
    }
}

impl<G: Generator> Generator for Arc<G> {
    async fn generate(&self, transcript: &[ChatMessage]) -> Result<String> {
        (**self).generate(transcript).await
    }
}

impl<C: Checker> Checker for &C {
    fn decide(&self, request: &CheckRequest) -> Result<String> {
        (**self).decide(request)
    }
}

impl<C: Checker> Checker for Arc<C> {
    fn decide(&self, request: &CheckRequest) -> Result<String> {
        (**self).decide(request)
    }
}

fn provider_failure(capability: &'static str, operation: &'static str, e: ProviderError) -> Error {
    let status = if e.is_retryable() {
        ErrorStatus::Temporary
    } else {
        ErrorStatus::Permanent
    };
    Error::capability_failed(capability, e.to_string())
        .with_operation(operation)
        .with_status(status)
        .set_source(e)
}

// ============================================================================
// Provider-backed generator
// ============================================================================

/// A [`Generator`] that prepends a system prompt and asks a provider
pub struct ChatGenerator<P> {
    capability: &'static str,
    provider: P,
    system_prompt: String,
    model: Option<String>,
    temperature: Option<f32>,
    usage: Option<Arc<Mutex<UsageTracker>>>,
}

impl<P: LlmProvider> ChatGenerator<P> {
    /// Use the template `prompt_name` from the store as the system prompt
    pub fn new(
        capability: &'static str,
        provider: P,
        prompts: &PromptStore,
        prompt_name: &str,
    ) -> Result<Self> {
        let system_prompt = prompts
            .get(prompt_name)
            .map_err(|e| e.with_operation("generator::new").with_context("capability", capability))?;
        Ok(Self::with_system_prompt(capability, provider, system_prompt))
    }

    pub fn with_system_prompt(
        capability: &'static str,
        provider: P,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            provider,
            system_prompt: system_prompt.into(),
            model: None,
            temperature: None,
            usage: None,
        }
    }

    /// Writer of the reflection loop
    pub fn writer(provider: P, prompts: &PromptStore) -> Result<Self> {
        Self::new("writer", provider, prompts, prompts::WRITER_PROMPT)
    }

    /// Reviewer of the reflection loop
    pub fn reviewer(provider: P, prompts: &PromptStore) -> Result<Self> {
        Self::new("reviewer", provider, prompts, prompts::REVIEWER_PROMPT)
    }

    /// Plan generator
    pub fn planner(provider: P, prompts: &PromptStore) -> Result<Self> {
        Self::new("planner", provider, prompts, prompts::PLANNING_PROMPT)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Record the token usage of every successful completion in `tracker`.
    /// Several generators may share one tracker.
    pub fn with_usage_tracker(mut self, tracker: Arc<Mutex<UsageTracker>>) -> Self {
        self.usage = Some(tracker);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: LlmProvider> Generator for ChatGenerator<P> {
    async fn generate(&self, transcript: &[ChatMessage]) -> Result<String> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend_from_slice(transcript);

        let mut request = CompletionRequest::new(messages);
        request.model = self.model.clone();
        request.temperature = self.temperature;

        tracing::debug!(
            capability = self.capability,
            provider = self.provider.name(),
            turns = transcript.len(),
            "generating"
        );

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| provider_failure(self.capability, "generator::generate", e))?;

        if let Some(tracker) = &self.usage {
            tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .track(&response.model, &response.usage);
        }

        response.content.ok_or_else(|| {
            Error::capability_failed(self.capability, "model returned no content")
                .with_operation("generator::generate")
                .with_context("model", response.model)
                .temporary()
        })
    }
}

// ============================================================================
// Provider-backed checker
// ============================================================================

/// A [`Checker`] that renders the check template and blocks on a provider.
///
/// Blocking needs a multi-threaded tokio runtime; anywhere else `decide`
/// fails with `Unsupported` instead of deadlocking.
pub struct PromptChecker<P> {
    provider: P,
    template: String,
}

impl<P: LlmProvider> PromptChecker<P> {
    pub fn new(provider: P, prompts: &PromptStore) -> Result<Self> {
        let template = prompts
            .get(prompts::CHECK_PROMPT)
            .map_err(|e| e.with_operation("checker::new"))?;
        Ok(Self::with_template(provider, template))
    }

    pub fn with_template(provider: P, template: impl Into<String>) -> Self {
        Self {
            provider,
            template: template.into(),
        }
    }

    /// The prompt sent for `request`
    pub fn render(&self, request: &CheckRequest) -> String {
        prompts::render_template(
            &self.template,
            &[
                ("format", request.format.as_str()),
                ("topic", request.topic.as_str()),
                ("essay", request.essay.as_str()),
            ],
        )
    }
}

impl<P: LlmProvider> Checker for PromptChecker<P> {
    fn decide(&self, request: &CheckRequest) -> Result<String> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::unsupported("checker must run inside a tokio runtime")
                .with_operation("checker::decide")
                .set_source(e)
        })?;
        if matches!(handle.runtime_flavor(), tokio::runtime::RuntimeFlavor::CurrentThread) {
            return Err(Error::unsupported("checker cannot block a current-thread runtime")
                .with_operation("checker::decide"));
        }

        let prompt = self.render(request);
        tracing::debug!(provider = self.provider.name(), format = %request.format, "checking candidate");

        tokio::task::block_in_place(|| handle.block_on(self.provider.prompt(&prompt)))
            .map_err(|e| provider_failure("checker", "checker::decide", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yava_error::ErrorKind;
    use yava_llm::{CompletionResponse, FinishReason, Role, Usage};

    /// Provider that answers with a fixed text and remembers requests
    struct EchoProvider {
        reply: Option<&'static str>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl EchoProvider {
        fn new(reply: Option<&'static str>) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }

        async fn complete(&self, request: CompletionRequest) -> std::result::Result<CompletionResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            match self.reply {
                Some("rate-limit") => Err(ProviderError::RateLimited { retry_after: None }),
                reply => Ok(CompletionResponse {
                    id: "1".into(),
                    model: "echo-1".into(),
                    content: reply.map(str::to_string),
                    finish_reason: FinishReason::Stop,
                    usage: Usage {
                        prompt_tokens: 12,
                        completion_tokens: 5,
                        total_tokens: 17,
                    },
                }),
            }
        }
    }

    fn store() -> PromptStore {
        PromptStore::from_pairs([
            (prompts::WRITER_PROMPT, "You write essays."),
            (prompts::CHECK_PROMPT, "Is this a {format} about {topic}? {essay}"),
        ])
    }

    #[tokio::test]
    async fn test_generator_prepends_system_prompt() {
        let writer = ChatGenerator::writer(EchoProvider::new(Some("draft")), &store())
            .unwrap()
            .with_model("gemini-1.5-pro-001");

        let out = writer.generate(&[ChatMessage::user("Write an essay about owls.")]).await.unwrap();
        assert_eq!(out, "draft");

        let seen = writer.provider().seen.lock().unwrap();
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].messages[0].role, Role::System);
        assert_eq!(seen[0].messages[0].content, "You write essays.");
        assert_eq!(seen[0].model.as_deref(), Some("gemini-1.5-pro-001"));
    }

    #[tokio::test]
    async fn test_generators_share_usage_tracker() {
        let tracker = Arc::new(Mutex::new(UsageTracker::new()));
        let writer = ChatGenerator::with_system_prompt("writer", EchoProvider::new(Some("draft")), "w")
            .with_usage_tracker(Arc::clone(&tracker));
        let reviewer = ChatGenerator::with_system_prompt("reviewer", EchoProvider::new(Some("critique")), "r")
            .with_usage_tracker(Arc::clone(&tracker));

        writer.generate(&[ChatMessage::user("x")]).await.unwrap();
        reviewer.generate(&[ChatMessage::user("x")]).await.unwrap();

        let usage = tracker.lock().unwrap();
        assert_eq!(usage.total_calls, 2);
        assert_eq!(usage.total_tokens(), 34);
        assert_eq!(usage.by_model["echo-1"].total_tokens, 34);
    }

    #[tokio::test]
    async fn test_failed_completion_not_tracked() {
        let tracker = Arc::new(Mutex::new(UsageTracker::new()));
        let writer = ChatGenerator::with_system_prompt("writer", EchoProvider::new(Some("rate-limit")), "s")
            .with_usage_tracker(Arc::clone(&tracker));

        assert!(writer.generate(&[ChatMessage::user("x")]).await.is_err());
        assert_eq!(tracker.lock().unwrap().total_calls, 0);
    }

    #[test]
    fn test_generator_missing_prompt() {
        let err = ChatGenerator::reviewer(EchoProvider::new(None), &store()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::PromptNotFound);
        assert_eq!(err.context_value("capability"), Some("reviewer"));
    }

    #[tokio::test]
    async fn test_generator_maps_provider_errors() {
        let writer = ChatGenerator::with_system_prompt("writer", EchoProvider::new(Some("rate-limit")), "s");
        let err = writer.generate(&[ChatMessage::user("x")]).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CapabilityFailed);
        assert!(err.is_retryable());
        assert_eq!(err.context_value("capability"), Some("writer"));
    }

    #[tokio::test]
    async fn test_generator_empty_content() {
        let writer = ChatGenerator::with_system_prompt("writer", EchoProvider::new(None), "s");
        let err = writer.generate(&[ChatMessage::user("x")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityFailed);
    }

    #[test]
    fn test_checker_render() {
        let checker = PromptChecker::new(EchoProvider::new(Some("Yes")), &store()).unwrap();
        let prompt = checker.render(&CheckRequest {
            format: "essay".into(),
            topic: "owls".into(),
            essay: "Owls hoot.".into(),
        });
        assert_eq!(prompt, "Is this a essay about owls? Owls hoot.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_checker_blocks_on_provider() {
        let checker = PromptChecker::new(EchoProvider::new(Some("Yes, it is.")), &store()).unwrap();
        let request = CheckRequest {
            format: "essay".into(),
            topic: "owls".into(),
            essay: "Owls hoot.".into(),
        };

        assert_eq!(checker.decide(&request).unwrap(), "Yes, it is.");
        assert_eq!(checker.provider.seen.lock().unwrap()[0].messages[0].role, Role::User);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_checker_refuses_current_thread_runtime() {
        let checker = PromptChecker::with_template(EchoProvider::new(Some("Yes")), "{essay}");
        let err = checker
            .decide(&CheckRequest {
                format: "essay".into(),
                topic: "t".into(),
                essay: "e".into(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_checker_outside_runtime() {
        let checker = PromptChecker::with_template(EchoProvider::new(Some("Yes")), "{essay}");
        let request = CheckRequest {
            format: "essay".into(),
            topic: "t".into(),
            essay: "e".into(),
        };
        assert_eq!(checker.decide(&request).unwrap_err().kind(), ErrorKind::Unsupported);
    }
}
