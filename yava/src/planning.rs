//! Plan generation
//!
//! Asks the same question several times in parallel and pulls the
//! `<PLAN>` and `<STEPS>` blocks out of each answer.

use futures_util::future::join_all;
use serde::Serialize;
use yava_error::{Error, Result};
use yava_llm::ChatMessage;

use crate::capability::Generator;
use crate::tags::{self, Extracted};

pub const DEFAULT_PLAN_COUNT: usize = 5;

pub const PLAN_TAG: &str = "PLAN";
pub const STEPS_TAG: &str = "STEPS";

/// Extracted blocks, one entry per answer in request order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSet {
    pub plans: Vec<Extracted>,
    pub steps: Vec<Extracted>,
}

impl PlanSet {
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Run `n` independent generations for `user_query` and extract their plans.
///
/// Answers are awaited together; the first failure in request order fails
/// the batch.
pub async fn generate_plans<G: Generator>(generator: &G, user_query: &str, n: usize) -> Result<PlanSet> {
    if n == 0 {
        return Err(Error::invalid_argument("plan count must be at least 1")
            .with_operation("planning::generate_plans"));
    }

    let transcript = [ChatMessage::user(user_query)];
    tracing::debug!(n, "generating plans");

    let answers = join_all((0..n).map(|_| generator.generate(&transcript)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()
        .map_err(|e| e.with_operation("planning::generate_plans"))?;

    let (plans, steps) = answers
        .iter()
        .map(|answer| (tags::extract(answer, PLAN_TAG), tags::extract(answer, STEPS_TAG)))
        .unzip();

    Ok(PlanSet { plans, steps })
}
