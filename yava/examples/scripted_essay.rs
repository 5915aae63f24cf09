//! Example: a reflection run with scripted capabilities
//!
//! No model is contacted; the writer, reviewer and checker replay canned
//! answers so every phase transition can be watched in the logs.
//!
//! Run with:
//!   RUST_LOG=yava=debug cargo run -p yava --example scripted_essay

use yava::testing::{ScriptedChecker, ScriptedGenerator};
use yava::{generate_plans, Reflection, ReflectionInput};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let writer = ScriptedGenerator::new([
        "Owls hunt at night.",
        "Owls hunt at night, guided by hearing sharp enough to find mice under snow.",
        "Owls hunt at night. Their asymmetric ears locate prey by sound alone, and \
         serrated feathers keep their flight silent.",
    ]);
    let reviewer = ScriptedGenerator::new([
        "Too short. Explain how they find prey.",
        "Better. Mention how they stay silent.",
    ]);
    let checker = ScriptedChecker::new(["Yes", "Yes", "No"]);

    let reflection = Reflection::new(writer, reviewer, checker, 5)?;
    let output = reflection
        .run(
            ReflectionInput::new()
                .with_topic("how owls hunt")
                .with_context("The audience is ten years old."),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&output)?);

    let planner = ScriptedGenerator::repeating(
        "<PLAN>Read field guides</PLAN><STEPS>1. library\n2. notes</STEPS>",
    );
    let plans = generate_plans(&planner, "How do I learn about owls?", 3).await?;
    println!("{}", serde_json::to_string_pretty(&plans)?);

    Ok(())
}
