//! Example: a reflection run against a hosted model
//!
//! Run with:
//!   # OpenAI (or any compatible server via YAVA_BASE_URL):
//!   OPENAI_API_KEY=sk-xxx cargo run -p yava --example live_essay -- "how owls hunt"
//!
//!   # Anthropic:
//!   ANTHROPIC_API_KEY=sk-xxx cargo run -p yava --example live_essay -- --anthropic "how owls hunt"
//!
//!   # Local server, no key:
//!   YAVA_BASE_URL=http://localhost:4000/v1 YAVA_MODEL=flash \
//!     cargo run -p yava --example live_essay -- --local "how owls hunt"
//!
//! Prompts are read from the crate's `prompts/` directory.

use std::env;
use std::sync::Arc;
use yava::{PromptStore, Reflection, ReflectionConfig, ReflectionInput};
use yava_llm::{AnthropicProvider, LlmProvider, OpenAIProvider, ProviderConfig, ProviderType};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("yava=info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let provider_type = if args.iter().any(|a| a == "--anthropic") {
        ProviderType::Anthropic
    } else if args.iter().any(|a| a == "--local") {
        ProviderType::Local
    } else {
        ProviderType::OpenAI
    };
    let topic = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "how owls hunt".to_string());

    let prompts = PromptStore::discover(env!("CARGO_MANIFEST_DIR"))?;
    let config = ProviderConfig::from_env(provider_type)?;

    match provider_type {
        ProviderType::Anthropic => write_essay(AnthropicProvider::new(config)?, &prompts, &topic).await,
        ProviderType::OpenAI | ProviderType::Local => {
            write_essay(OpenAIProvider::new(config)?, &prompts, &topic).await
        }
    }
}

async fn write_essay<P: LlmProvider>(
    provider: P,
    prompts: &PromptStore,
    topic: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Provider: {} ({})", provider.name(), provider.default_model());

    let provider = Arc::new(provider);
    let reflection = Reflection::from_providers(
        Arc::clone(&provider),
        Arc::clone(&provider),
        provider,
        prompts,
        ReflectionConfig::new(3),
    )?;

    let output = reflection.run(ReflectionInput::new().with_topic(topic)).await?;

    println!("Rounds: {} ({:?})\n", output.rounds, output.stop_reason);
    if output.final_text.is_empty() {
        println!("No draft reached review. Latest draft:\n");
        if let Some(last) = output.messages.last() {
            println!("{}", last.content);
        }
    } else {
        println!("{}", output.final_text);
    }

    Ok(())
}
