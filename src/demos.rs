//! Scripted demonstrations.
//!
//! Each demo fetches its pipeline from the [`ModelRegistry`], so an
//! unreachable backend degrades to mock output instead of aborting.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::chain::history::SessionStore;
use crate::chain::template::PromptTemplate;
use crate::chain::{ConversationChain, LlmChain, StrOutputParser};
use crate::config::{Config, DemoName};
use crate::pipeline::registry::ModelRegistry;
use crate::pipeline::{GenerationParams, Task};

pub const FINBERT_MODEL: &str = "ProsusAI/finbert";

pub const TECH_WRITER_TEMPLATE: &str = "
You are a technical writer explaining concepts to a junior engineer.
Concept: {topic}
Explanation:";

pub async fn run(
    name: DemoName,
    registry: &ModelRegistry,
    config: &Config,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    info!(demo = ?name, "Running demo");
    match name {
        DemoName::Sentiment => sentiment(registry, out).await,
        DemoName::Finbert => finbert(registry, out).await,
        DemoName::Generate => generate(registry, out).await,
        DemoName::Chain => chain(registry, out).await,
        DemoName::ChainParser => chain_parser(registry, out).await,
        DemoName::History => history(registry, config, out).await,
    }
}

async fn sentiment(registry: &ModelRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    let inputs = [
        "I seriously love how easy Python is for prototyping.",
        "Debugging async race conditions is the absolute worst nightmare.",
    ];

    writeln!(out, "1. Loading model (this happens once)...")?;
    let classifier = registry.get(Task::SentimentAnalysis, None).await;

    writeln!(out, "\n2. Running inference...")?;
    let start = Instant::now();
    let results = classifier.classify_batch(&inputs).await?;
    let elapsed = start.elapsed();

    writeln!(out, "{}", "-".repeat(30))?;
    for (text, result) in inputs.iter().zip(&results) {
        writeln!(out, "Input:  {text}")?;
        writeln!(out, "Output: {} (Confidence: {:.4})", result.label, result.score)?;
        writeln!(out, "{}", "-".repeat(30))?;
    }
    writeln!(out, "Inference time: {:.4} seconds", elapsed.as_secs_f64())?;
    Ok(())
}

async fn finbert(registry: &ModelRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    let inputs = [
        "The company announced a restructuring plan to cut operational costs by 20%.",
        "I hate waiting in line at the grocery store.",
    ];

    let classifier = registry.get(Task::SentimentAnalysis, Some(FINBERT_MODEL)).await;
    writeln!(out, "\n--- Running Financial Sentiment Analysis with FinBERT ---\n")?;

    let results = classifier.classify_batch(&inputs).await?;
    for (text, result) in inputs.iter().zip(&results) {
        writeln!(out, "Input:  {text}")?;
        writeln!(out, "Label:  {}", result.label)?;
        writeln!(out, "Score:  {:.4}", result.score)?;
        writeln!(out, "{}", "-".repeat(40))?;
    }
    Ok(())
}

async fn generate(registry: &ModelRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    let prompts = [
        "The future of software engineering is",
        "To fix a segmentation fault, you must",
    ];

    let generator = registry.get(Task::TextGeneration, None).await;
    let params = GenerationParams {
        max_new_tokens: 30,
        seed: Some(42),
        return_full_text: true,
    };

    let outputs = generator.generate_batch(&prompts, &params).await?;
    writeln!(out, "{}", "-".repeat(30))?;
    for (prompt, text) in prompts.iter().zip(&outputs) {
        writeln!(out, "Prompt: {prompt}")?;
        writeln!(out, "Result: {text}...")?;
        writeln!(out, "{}", "-".repeat(30))?;
    }
    Ok(())
}

fn topic(value: &str) -> HashMap<String, String> {
    HashMap::from([("topic".to_string(), value.to_string())])
}

async fn chain(registry: &ModelRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    let llm = registry.get(Task::TextGeneration, None).await;
    let chain = LlmChain::new(
        PromptTemplate::from_template(TECH_WRITER_TEMPLATE),
        llm,
        GenerationParams::default(),
    );

    writeln!(out, "\n--- Running Chain ---\n")?;
    writeln!(out, "{}", chain.invoke(&topic("Docker")).await?)?;
    Ok(())
}

async fn chain_parser(registry: &ModelRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    let llm = registry.get(Task::TextGeneration, None).await;
    let params = GenerationParams {
        return_full_text: false,
        ..Default::default()
    };
    let chain = LlmChain::new(PromptTemplate::from_template(TECH_WRITER_TEMPLATE), llm, params)
        .with_parser(StrOutputParser);

    writeln!(out, "\n--- Running Chain with Output Parser ---\n")?;
    writeln!(out, "{}", chain.invoke(&topic("Recursion")).await?)?;
    Ok(())
}

async fn history(
    registry: &ModelRegistry,
    config: &Config,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let llm = registry.get(Task::TextGeneration, None).await;
    let conversation = ConversationChain::new(
        Arc::new(SessionStore::new()),
        &config.chat.system_prompt,
        config.chat.max_new_tokens,
    );

    let turns = ["Hi, my name is Dave.", "What is my name?"];
    for (i, input) in turns.iter().enumerate() {
        writeln!(out, "\n--- Turn {} ---", i + 1)?;
        let reply = conversation.invoke(llm.as_ref(), "user_123", input).await?;
        writeln!(out, "AI: {}", reply.text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::hosted::HostedLoader;

    fn mock_registry() -> ModelRegistry {
        let config = Config::default();
        let loader = HostedLoader::new(config.backend.clone()).unwrap();
        let registry = ModelRegistry::new(Arc::new(loader), &config.backend);
        registry.force_mock_mode();
        registry
    }

    async fn capture(name: DemoName) -> String {
        let mut buf = Vec::new();
        run(name, &mock_registry(), &Config::default(), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_sentiment_demo_labels_inputs() {
        let out = capture(DemoName::Sentiment).await;
        assert!(out.contains("Input:  I seriously love how easy Python is for prototyping."));
        assert!(out.contains("Output: POSITIVE"));
        assert!(out.contains("Output: NEGATIVE"));
        assert!(out.contains("Inference time:"));
    }

    #[tokio::test]
    async fn test_finbert_demo_prints_scores() {
        let out = capture(DemoName::Finbert).await;
        assert!(out.contains("Label:  NEGATIVE"));
        assert_eq!(out.matches("Score:").count(), 2);
    }

    #[tokio::test]
    async fn test_generate_demo_echoes_prompts() {
        let out = capture(DemoName::Generate).await;
        assert!(out.contains("Result: The future of software engineering is "));
        assert!(out.contains("Result: To fix a segmentation fault, you must "));
    }

    #[tokio::test]
    async fn test_chain_demos() {
        let raw = capture(DemoName::Chain).await;
        assert!(raw.contains("Concept: Docker"));

        let parsed = capture(DemoName::ChainParser).await;
        assert!(!parsed.contains("Concept: Recursion"));
    }

    #[tokio::test]
    async fn test_history_demo_runs_two_turns() {
        let out = capture(DemoName::History).await;
        assert!(out.contains("--- Turn 1 ---"));
        assert!(out.contains("--- Turn 2 ---"));
        assert_eq!(out.matches("AI: ").count(), 2);
    }
}
