//! Conversation state threaded through a reflection run

use serde::Serialize;
use yava_llm::{ChatMessage, Role};

use crate::reflection::StopReason;

/// Format used when the caller does not name one
pub const DEFAULT_FORMAT: &str = "essay";

/// What the caller hands to [`Reflection::run`](crate::Reflection::run)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionInput {
    pub(crate) topic: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) context: Option<String>,
    pub(crate) messages: Vec<ChatMessage>,
}

impl ReflectionInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Appended verbatim to the seed instruction
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Start from an existing transcript; initialization is then skipped
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }
}

/// State of one run. Owned by exactly one run and mutated only between phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    counter: usize,
    final_text: Option<String>,
    previous: Option<String>,
    topic: Option<String>,
    format: Option<String>,
    context: Option<String>,
}

impl ConversationState {
    pub fn new(input: ReflectionInput) -> Self {
        Self {
            messages: input.messages,
            counter: 0,
            final_text: None,
            previous: None,
            topic: input.topic,
            format: input.format,
            context: input.context,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Completed generation rounds
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn final_text(&self) -> Option<&str> {
        self.final_text.as_deref()
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Text of the newest writer turn
    pub fn latest_candidate(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Topic shown to the checker: the explicit field, else the seed message
    pub(crate) fn topic_for_check(&self) -> &str {
        match self.topic.as_deref() {
            Some(topic) => topic,
            None => self.messages.first().map(|m| m.content.as_str()).unwrap_or(""),
        }
    }

    /// Merge a phase result. `previous` takes the old `final` before it is replaced.
    pub(crate) fn apply(&mut self, update: StateUpdate) {
        if let Some(counter) = update.counter {
            debug_assert!(counter > self.counter);
            self.counter = counter;
        }
        if let Some(format) = update.format {
            self.format = Some(format);
        }
        self.messages.extend(update.messages);
        if let Some(text) = update.final_text {
            if let Some(old) = self.final_text.replace(text) {
                self.previous = Some(old);
            }
        }
    }

    pub fn into_output(self, stop_reason: StopReason) -> ReflectionOutput {
        ReflectionOutput {
            final_text: self.final_text.unwrap_or_default(),
            previous: self.previous.unwrap_or_default(),
            messages: self.messages,
            rounds: self.counter,
            stop_reason,
        }
    }
}

/// Partial update produced by a phase once its capability call has returned
#[derive(Debug, Default)]
pub(crate) struct StateUpdate {
    pub messages: Vec<ChatMessage>,
    pub counter: Option<usize>,
    pub format: Option<String>,
    pub final_text: Option<String>,
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionOutput {
    /// Latest accepted candidate; empty if no reflect phase ran
    #[serde(rename = "final")]
    pub final_text: String,
    /// Candidate accepted one reflect phase earlier, or empty
    pub previous: String,
    pub messages: Vec<ChatMessage>,
    pub rounds: usize,
    pub stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_shifts_into_previous() {
        let mut state = ConversationState::new(ReflectionInput::new().with_topic("owls"));

        state.apply(StateUpdate {
            final_text: Some("draft 1".into()),
            ..Default::default()
        });
        assert_eq!(state.final_text(), Some("draft 1"));
        assert_eq!(state.previous(), None);

        state.apply(StateUpdate {
            final_text: Some("draft 2".into()),
            ..Default::default()
        });
        assert_eq!(state.final_text(), Some("draft 2"));
        assert_eq!(state.previous(), Some("draft 1"));
    }

    #[test]
    fn test_apply_appends_messages_and_counter() {
        let mut state = ConversationState::new(ReflectionInput::new().with_messages(vec![ChatMessage::user("seed")]));
        state.apply(StateUpdate {
            counter: Some(1),
            messages: vec![ChatMessage::assistant("draft")],
            ..Default::default()
        });

        assert_eq!(state.counter(), 1);
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.latest_candidate(), Some("draft"));
    }

    #[test]
    fn test_topic_for_check_prefers_field() {
        let seeded = vec![ChatMessage::user("Write an essay about owls.\nAdditional context for your writing: x")];

        let state = ConversationState::new(ReflectionInput::new().with_topic("owls").with_messages(seeded.clone()));
        assert_eq!(state.topic_for_check(), "owls");

        let state = ConversationState::new(ReflectionInput::new().with_messages(seeded.clone()));
        assert_eq!(state.topic_for_check(), seeded[0].content);
    }

    #[test]
    fn test_output_serialization() {
        let state = ConversationState::new(ReflectionInput::new().with_messages(vec![ChatMessage::user("seed")]));
        let json = serde_json::to_value(state.into_output(StopReason::Declined)).unwrap();

        assert_eq!(json["final"], "");
        assert_eq!(json["previous"], "");
        assert_eq!(json["rounds"], 0);
        assert_eq!(json["stop_reason"], "declined");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
