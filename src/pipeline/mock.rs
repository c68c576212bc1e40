//! Canned pipelines used when a real model cannot be loaded.
//!
//! Sentiment is decided by counting hits against two fixed keyword lists.
//! Generation appends one of a handful of stock continuations, picked by a
//! seeded RNG when the caller supplies a seed.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::pipeline::{wrong_task, GenerationParams, Pipeline, Sentiment, Task};

pub const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "love", "loved", "like", "happy", "amazing", "awesome",
    "wonderful", "fantastic", "best", "easy", "enjoy", "nice", "brilliant", "profit", "growth",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "hated", "sad", "worst", "horrible", "poor", "angry",
    "nightmare", "broken", "fail", "failed", "slow", "loss", "ugly", "annoying",
];

const CONTINUATIONS: &[&str] = &[
    "a story that is still being written, one experiment at a time.",
    "something we will only understand by building it and watching it fail.",
    "closer than it looks, although the details keep changing.",
    "mostly about asking better questions and reading the error messages carefully.",
    "an open problem, and that is exactly what makes it interesting.",
];

/// Count positive and negative keyword hits in `text`.
pub fn keyword_counts(text: &str) -> (usize, usize) {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .fold((0, 0), |(pos, neg), word| {
            if POSITIVE_WORDS.contains(&word) {
                (pos + 1, neg)
            } else if NEGATIVE_WORDS.contains(&word) {
                (pos, neg + 1)
            } else {
                (pos, neg)
            }
        })
}

/// Keyword-matched sentiment: majority wins, ties are `NEUTRAL`.
pub fn mock_sentiment(text: &str) -> Sentiment {
    let (pos, neg) = keyword_counts(text);
    let label = match pos.cmp(&neg) {
        std::cmp::Ordering::Greater => "POSITIVE",
        std::cmp::Ordering::Less => "NEGATIVE",
        std::cmp::Ordering::Equal => "NEUTRAL",
    };
    let total = pos + neg;
    let score = if total == 0 {
        0.5
    } else {
        0.5 + 0.5 * pos.abs_diff(neg) as f64 / total as f64
    };
    Sentiment {
        label: label.to_string(),
        score,
    }
}

/// Canned continuation, deterministic for a given seed.
pub fn mock_generation(prompt: &str, params: &GenerationParams) -> String {
    let index = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed).random_range(0..CONTINUATIONS.len()),
        None => rand::rng().random_range(0..CONTINUATIONS.len()),
    };

    let continuation = CONTINUATIONS[index]
        .split_whitespace()
        .take(params.max_new_tokens)
        .collect::<Vec<_>>()
        .join(" ");

    if !params.return_full_text {
        return continuation;
    }
    match (prompt.is_empty(), continuation.is_empty()) {
        (true, _) => continuation,
        (false, true) => prompt.to_string(),
        (false, false) => format!("{prompt} {continuation}"),
    }
}

/// A pipeline that never touches a model.
#[derive(Debug, Clone)]
pub struct MockPipeline {
    task: Task,
    model: String,
}

impl MockPipeline {
    pub fn new(task: Task, model: impl Into<String>) -> Self {
        Self {
            task,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Pipeline for MockPipeline {
    fn task(&self) -> Task {
        self.task
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_mock(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if self.task != Task::TextGeneration {
            return Err(wrong_task(self.task, Task::TextGeneration));
        }
        Ok(mock_generation(prompt, params))
    }

    async fn classify(&self, text: &str) -> Result<Sentiment> {
        if self.task != Task::SentimentAnalysis {
            return Err(wrong_task(self.task, Task::SentimentAnalysis));
        }
        Ok(mock_sentiment(text))
    }
}
