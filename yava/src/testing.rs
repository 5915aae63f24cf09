//! Scripted capabilities for deterministic runs
//!
//! [`ScriptedGenerator`] and [`ScriptedChecker`] answer from a fixed script
//! and record what they were asked, so a reflection run can be replayed
//! without a model.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use yava_error::{Error, ErrorKind, Result};
use yava_llm::ChatMessage;

use crate::capability::{CheckRequest, Checker, Generator};

#[derive(Debug)]
enum Fallback {
    Exhausted,
    Repeat(String),
    Fail(ErrorKind, String),
}

#[derive(Debug)]
struct Script {
    replies: VecDeque<String>,
    fallback: Fallback,
}

impl Script {
    fn new<I, S>(replies: I, fallback: Fallback) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            fallback,
        }
    }

    fn next(&mut self, capability: &'static str) -> Result<String> {
        if let Some(reply) = self.replies.pop_front() {
            return Ok(reply);
        }
        match &self.fallback {
            Fallback::Repeat(reply) => Ok(reply.clone()),
            Fallback::Fail(kind, message) => Err(Error::new(*kind, message.clone())),
            Fallback::Exhausted => Err(Error::capability_failed(capability, "script exhausted")
                .with_operation("testing::script")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Generator`] that replays scripted replies
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<Script>,
    transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    /// Reply in order; fail once the script runs out
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::new(replies, Fallback::Exhausted))
    }

    /// Always give the same reply
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::with_script(Script::new(Vec::<String>::new(), Fallback::Repeat(reply.into())))
    }

    /// Fail every call with the given error
    pub fn failing(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_script(Script::new(Vec::<String>::new(), Fallback::Fail(kind, message.into())))
    }

    /// Once the scripted replies are used up, fail with the given error
    pub fn then_fail(self, kind: ErrorKind, message: impl Into<String>) -> Self {
        lock(&self.script).fallback = Fallback::Fail(kind, message.into());
        self
    }

    /// Once the scripted replies are used up, keep giving `reply`
    pub fn then_repeat(self, reply: impl Into<String>) -> Self {
        lock(&self.script).fallback = Fallback::Repeat(reply.into());
        self
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Every transcript received, oldest first
    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.transcripts).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.transcripts).len()
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, transcript: &[ChatMessage]) -> Result<String> {
        lock(&self.transcripts).push(transcript.to_vec());
        lock(&self.script).next("generator")
    }
}

/// A [`Checker`] that replays scripted decisions
#[derive(Debug)]
pub struct ScriptedChecker {
    script: Mutex<Script>,
    requests: Mutex<Vec<CheckRequest>>,
}

impl ScriptedChecker {
    pub fn new<I, S>(decisions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::new(decisions, Fallback::Exhausted))
    }

    pub fn always(decision: impl Into<String>) -> Self {
        Self::with_script(Script::new(Vec::<String>::new(), Fallback::Repeat(decision.into())))
    }

    pub fn failing(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_script(Script::new(Vec::<String>::new(), Fallback::Fail(kind, message.into())))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CheckRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Checker for ScriptedChecker {
    fn decide(&self, request: &CheckRequest) -> Result<String> {
        lock(&self.requests).push(request.clone());
        lock(&self.script).next("checker")
    }
}
