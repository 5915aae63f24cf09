//! # Reflection loop
//!
//! A writer drafts, a checker decides whether the draft is worth reviewing,
//! a reviewer critiques it and the critique becomes the writer's next input.
//!
//! ```text
//! Initialize -> Generate -> should_reflect --No--> Terminate(Declined)
//!                  ^              | Yes
//!                  |              v
//!                  +-- No -- Reflect -> should_continue --limit--> Terminate(RoundLimit)
//! ```
//!
//! Each work phase awaits its capability first and only then merges the
//! result into the state. Dropping a run while it waits leaves the state
//! exactly as the previous phase left it.

use serde::Serialize;
use tracing::Instrument;
use yava_error::{Error, Result};
use yava_llm::{ChatMessage, LlmProvider, Role};

use crate::capability::{ChatGenerator, CheckRequest, Checker, Generator, PromptChecker};
use crate::prompts::PromptStore;
use crate::state::{ConversationState, ReflectionInput, ReflectionOutput, StateUpdate, DEFAULT_FORMAT};

/// Default number of generation rounds
pub const DEFAULT_MAX_COUNT: usize = 5;

/// Checker answers starting with this prefix send the draft to review
const ACCEPT_PREFIX: &str = "Yes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Maximum number of generation rounds
    pub max_count: usize,
    /// Format used when the input does not name one
    pub default_format: String,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            default_format: DEFAULT_FORMAT.to_string(),
        }
    }
}

impl ReflectionConfig {
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            ..Default::default()
        }
    }

    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_count == 0 {
            return Err(Error::config_invalid("max_count must be at least 1")
                .with_operation("reflection::config"));
        }
        if self.default_format.trim().is_empty() {
            return Err(Error::config_invalid("default format must not be empty")
                .with_operation("reflection::config"));
        }
        Ok(())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The checker did not send the latest draft to review
    Declined,
    /// `max_count` generation rounds were used up
    RoundLimit,
}

/// Where a run is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialize,
    Generate,
    Reflect,
    Terminate(StopReason),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminate(_))
    }
}

/// The generate / critique / decide loop over injected capabilities
pub struct Reflection<W, R, C> {
    writer: W,
    reviewer: R,
    checker: C,
    config: ReflectionConfig,
}

impl<W, R, C> Reflection<W, R, C>
where
    W: Generator,
    R: Generator,
    C: Checker,
{
    pub fn new(writer: W, reviewer: R, checker: C, max_count: usize) -> Result<Self> {
        Self::with_config(writer, reviewer, checker, ReflectionConfig::new(max_count))
    }

    pub fn with_config(writer: W, reviewer: R, checker: C, config: ReflectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            writer,
            reviewer,
            checker,
            config,
        })
    }

    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    /// Drive a fresh run to its end
    pub async fn run(&self, input: ReflectionInput) -> Result<ReflectionOutput> {
        let span = tracing::info_span!(
            "reflection",
            topic = input.topic.as_deref().unwrap_or(""),
            max_count = self.config.max_count
        );

        async move {
            let mut state = ConversationState::new(input);
            let mut phase = Phase::Initialize;
            loop {
                phase = self.step(&mut state, phase).await?;
                if let Phase::Terminate(reason) = phase {
                    tracing::info!(rounds = state.counter(), ?reason, "reflection finished");
                    return Ok(state.into_output(reason));
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one phase and return the next
    pub async fn step(&self, state: &mut ConversationState, phase: Phase) -> Result<Phase> {
        let next = match phase {
            Phase::Initialize => {
                let update = self.initialize(state)?;
                state.apply(update);
                Phase::Generate
            }
            Phase::Generate => {
                let update = self.generate(state).await?;
                state.apply(update);
                self.should_reflect(state)?
            }
            Phase::Reflect => {
                let update = self.reflect(state).await?;
                state.apply(update);
                self.should_continue(state)
            }
            Phase::Terminate(_) => phase,
        };
        tracing::debug!(from = ?phase, to = ?next, round = state.counter(), "phase");
        Ok(next)
    }

    /// Ask the checker whether the newest draft goes to review
    pub fn should_reflect(&self, state: &ConversationState) -> Result<Phase> {
        let request = CheckRequest {
            format: state
                .format()
                .unwrap_or(self.config.default_format.as_str())
                .to_string(),
            topic: state.topic_for_check().to_string(),
            essay: state
                .messages()
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        };

        let decision = self.checker.decide(&request)?;
        if decision.starts_with(ACCEPT_PREFIX) {
            Ok(Phase::Reflect)
        } else {
            tracing::debug!(decision = %decision, "checker declined");
            Ok(Phase::Terminate(StopReason::Declined))
        }
    }

    pub fn should_continue(&self, state: &ConversationState) -> Phase {
        if state.counter() >= self.config.max_count {
            Phase::Terminate(StopReason::RoundLimit)
        } else {
            Phase::Generate
        }
    }

    fn initialize(&self, state: &ConversationState) -> Result<StateUpdate> {
        if !state.messages().is_empty() {
            return Ok(StateUpdate::default());
        }

        let topic = match state.topic() {
            Some(topic) if !topic.trim().is_empty() => topic,
            _ => {
                return Err(Error::config_invalid("topic is required to start a run")
                    .with_operation("reflection::initialize"))
            }
        };
        let format = state
            .format()
            .unwrap_or(self.config.default_format.as_str())
            .to_string();

        let mut seed = format!("Write an {} about {}.", format, topic);
        if let Some(context) = state.context() {
            seed.push_str("\nAdditional context for your writing: ");
            seed.push_str(context);
        }

        Ok(StateUpdate {
            messages: vec![ChatMessage::user(seed)],
            format: Some(format),
            ..Default::default()
        })
    }

    async fn generate(&self, state: &ConversationState) -> Result<StateUpdate> {
        if state.messages().is_empty() {
            return Err(Error::invalid_argument("cannot generate from an empty transcript")
                .with_operation("reflection::generate"));
        }

        let draft = self.writer.generate(state.messages()).await?;

        Ok(StateUpdate {
            counter: Some(state.counter() + 1),
            messages: vec![ChatMessage::assistant(draft)],
            ..Default::default()
        })
    }

    async fn reflect(&self, state: &ConversationState) -> Result<StateUpdate> {
        let Some(accepted) = state.latest_candidate().map(str::to_string) else {
            return Err(Error::invalid_argument("cannot reflect before a draft exists")
                .with_operation("reflection::reflect"));
        };

        let critique = self.reviewer.generate(&swap_roles(state.messages())).await?;

        Ok(StateUpdate {
            messages: vec![ChatMessage::user(critique)],
            final_text: Some(accepted),
            ..Default::default()
        })
    }
}

impl<P: LlmProvider> Reflection<ChatGenerator<P>, ChatGenerator<P>, PromptChecker<P>> {
    /// Build a loop whose capabilities all talk to hosted models
    pub fn from_providers(
        writer: P,
        reviewer: P,
        checker: P,
        prompts: &PromptStore,
        config: ReflectionConfig,
    ) -> Result<Self> {
        Self::with_config(
            ChatGenerator::writer(writer, prompts)?,
            ChatGenerator::reviewer(reviewer, prompts)?,
            PromptChecker::new(checker, prompts)?,
            config,
        )
    }
}

/// Swap user and assistant turns, except the first message.
///
/// The reviewer then reads the writer's drafts as if a person had submitted
/// them. System turns are left alone.
pub fn swap_roles(transcript: &[ChatMessage]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let role = match msg.role {
                _ if i == 0 => msg.role,
                Role::User => Role::Assistant,
                Role::Assistant => Role::User,
                Role::System => Role::System,
            };
            ChatMessage::new(role, msg.content.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedChecker, ScriptedGenerator};
    use std::time::Duration;
    use yava_error::ErrorKind;

    fn reflection(
        writer: ScriptedGenerator,
        reviewer: ScriptedGenerator,
        checker: ScriptedChecker,
        max_count: usize,
    ) -> Reflection<ScriptedGenerator, ScriptedGenerator, ScriptedChecker> {
        Reflection::new(writer, reviewer, checker, max_count).unwrap()
    }

    #[test]
    fn test_swap_roles_keeps_first_message() {
        let transcript = vec![
            ChatMessage::user("Write an essay about owls."),
            ChatMessage::assistant("draft 1"),
            ChatMessage::user("critique 1"),
            ChatMessage::assistant("draft 2"),
        ];

        let swapped = swap_roles(&transcript);

        assert_eq!(swapped[0], transcript[0]);
        assert_eq!(swapped[1], ChatMessage::user("draft 1"));
        assert_eq!(swapped[2], ChatMessage::assistant("critique 1"));
        assert_eq!(swapped[3], ChatMessage::user("draft 2"));
        assert_eq!(swap_roles(&swapped), transcript);
    }

    #[test]
    fn test_swap_roles_leaves_system_turns() {
        let swapped = swap_roles(&[ChatMessage::user("a"), ChatMessage::system("s")]);
        assert_eq!(swapped[1].role, Role::System);
        assert!(swap_roles(&[]).is_empty());
    }

    #[test]
    fn test_zero_max_count_rejected() {
        let err = Reflection::new(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("Yes"),
            0,
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_seed_message() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("No"),
            3,
        );
        let mut state = ConversationState::new(
            ReflectionInput::new()
                .with_topic("owls")
                .with_format("poem")
                .with_context("keep it short"),
        );

        let next = loop_.step(&mut state, Phase::Initialize).await.unwrap();

        assert_eq!(next, Phase::Generate);
        assert_eq!(
            state.messages(),
            &[ChatMessage::user(
                "Write an poem about owls.\nAdditional context for your writing: keep it short"
            )]
        );
        assert_eq!(state.format(), Some("poem"));
    }

    #[tokio::test]
    async fn test_format_defaults_to_config() {
        let loop_ = Reflection::with_config(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("No"),
            ReflectionConfig::new(1).with_default_format("article"),
        )
        .unwrap();
        let mut state = ConversationState::new(ReflectionInput::new().with_topic("tides"));

        loop_.step(&mut state, Phase::Initialize).await.unwrap();
        assert_eq!(state.messages()[0].content, "Write an article about tides.");
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("Yes"),
            2,
        );
        let err = loop_
            .run(ReflectionInput::new().with_topic("   "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(loop_.writer.calls(), 0);
    }

    #[tokio::test]
    async fn test_checker_sees_format_topic_and_draft() {
        let checker = ScriptedChecker::always("No thanks");
        let loop_ = reflection(
            ScriptedGenerator::repeating("Owls are nocturnal."),
            ScriptedGenerator::repeating("c"),
            checker,
            3,
        );

        let output = loop_
            .run(ReflectionInput::new().with_topic("owls").with_context("for kids"))
            .await
            .unwrap();

        assert_eq!(output.stop_reason, StopReason::Declined);
        assert_eq!(output.rounds, 1);
        assert_eq!(
            loop_.checker.requests(),
            vec![CheckRequest {
                format: "essay".into(),
                topic: "owls".into(),
                essay: "Owls are nocturnal.".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reviewer_sees_swapped_transcript() {
        let loop_ = reflection(
            ScriptedGenerator::new(["draft 1", "draft 2"]),
            ScriptedGenerator::repeating("critique"),
            ScriptedChecker::new(["Yes", "No"]),
            5,
        );

        let output = loop_.run(ReflectionInput::new().with_topic("owls")).await.unwrap();

        let seen = loop_.reviewer.transcripts();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].role, Role::User);
        assert_eq!(seen[0][1], ChatMessage::user("draft 1"));

        // The writer gets the critique back as a user turn.
        let writer_seen = loop_.writer.transcripts();
        assert_eq!(writer_seen[1].last(), Some(&ChatMessage::user("critique")));

        assert_eq!(output.final_text, "draft 1");
        assert_eq!(output.stop_reason, StopReason::Declined);
        assert_eq!(output.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_round_limit() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("draft"),
            ScriptedGenerator::repeating("critique"),
            ScriptedChecker::always("Yes"),
            3,
        );

        let output = loop_.run(ReflectionInput::new().with_topic("owls")).await.unwrap();

        assert_eq!(output.rounds, 3);
        assert_eq!(output.stop_reason, StopReason::RoundLimit);
        assert_eq!(loop_.writer.calls(), 3);
        assert_eq!(loop_.reviewer.calls(), 3);
    }

    #[tokio::test]
    async fn test_terminate_is_absorbing() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("Yes"),
            1,
        );
        let mut state = ConversationState::new(ReflectionInput::new().with_topic("owls"));
        let before = state.clone();

        let phase = Phase::Terminate(StopReason::Declined);
        assert_eq!(loop_.step(&mut state, phase).await.unwrap(), phase);
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_generate_on_empty_transcript() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("Yes"),
            1,
        );
        let mut state = ConversationState::new(ReflectionInput::new());

        let err = loop_.step(&mut state, Phase::Generate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_reflect_without_draft() {
        let loop_ = reflection(
            ScriptedGenerator::repeating("d"),
            ScriptedGenerator::repeating("c"),
            ScriptedChecker::always("Yes"),
            3,
        );
        let mut state = ConversationState::new(ReflectionInput::new().with_topic("owls"));
        let phase = loop_.step(&mut state, Phase::Initialize).await.unwrap();
        assert_eq!(phase, Phase::Generate);

        let before = state.clone();
        let err = loop_.step(&mut state, Phase::Reflect).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.operation(), "reflection::reflect");
        assert_eq!(state, before);
        assert_eq!(state.final_text(), None);
        assert_eq!(loop_.reviewer.calls(), 0);
    }

    struct Stalled;

    impl Generator for Stalled {
        async fn generate(&self, _transcript: &[ChatMessage]) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_generate_commits_nothing() {
        let loop_ = Reflection::new(Stalled, Stalled, ScriptedChecker::always("Yes"), 2).unwrap();
        let mut state = ConversationState::new(ReflectionInput::new().with_topic("owls"));
        loop_.step(&mut state, Phase::Initialize).await.unwrap();
        let before = state.clone();

        let step = loop_.step(&mut state, Phase::Generate);
        assert!(tokio::time::timeout(Duration::from_millis(20), step).await.is_err());

        assert_eq!(state, before);
        assert_eq!(state.counter(), 0);
    }
}
