//! # Yava
//!
//! Reflection agents over hosted LLMs.
//!
//! A [`Reflection`] loop drives three injected capabilities:
//! 1. the writer drafts a text for a topic
//! 2. the checker decides whether the draft goes to review (`"Yes..."`)
//! 3. the reviewer critiques the draft, and the critique is the writer's next input
//!
//! until the checker declines or `max_count` rounds are used up.
//!
//! ```rust
//! use yava::testing::{ScriptedChecker, ScriptedGenerator};
//! use yava::{Reflection, ReflectionInput, StopReason};
//!
//! # tokio_test::block_on(async {
//! let reflection = Reflection::new(
//!     ScriptedGenerator::new(["first draft", "second draft"]),
//!     ScriptedGenerator::repeating("needs more owls"),
//!     ScriptedChecker::new(["Yes", "No"]),
//!     5,
//! )?;
//!
//! let output = reflection.run(ReflectionInput::new().with_topic("owls")).await?;
//! assert_eq!(output.final_text, "first draft");
//! assert_eq!(output.stop_reason, StopReason::Declined);
//! # Ok::<(), yava::Error>(())
//! # }).unwrap();
//! ```

pub mod capability;
pub mod planning;
pub mod prompts;
pub mod reflection;
pub mod state;
pub mod tags;
pub mod testing;

pub use capability::{ChatGenerator, CheckRequest, Checker, Generator, PromptChecker};
pub use planning::{generate_plans, PlanSet};
pub use prompts::PromptStore;
pub use reflection::{swap_roles, Phase, Reflection, ReflectionConfig, StopReason};
pub use state::{ConversationState, ReflectionInput, ReflectionOutput};
pub use tags::{extract, Extracted};

pub use yava_error::{Error, ErrorKind, ErrorStatus, Result};
pub use yava_llm::{ChatMessage, Role};
