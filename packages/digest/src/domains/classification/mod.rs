//! Interest classification: a cheap relevance check on a paper's abstract
//! that runs before full-text summarization.
//!
//! The model answers in free text; the verdict is read with keyword
//! matching. Anything other than a clean negative keeps the paper.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::common::utils::render_prompt;
use crate::kernel::{BaseAI, TokenUsage};

lazy_static! {
    // Both sets are matched against the raw verdict. "not interested" also
    // contains "interested", so it reads as ambiguous and keeps the paper.
    static ref NEGATIVE_KEYWORDS: Regex =
        Regex::new(r"\bnot interested\b|\bno\b|不感兴趣|无兴趣|否").unwrap();
    static ref POSITIVE_KEYWORDS: Regex =
        Regex::new(r"\binterested\b|\byes\b|感兴趣|有兴趣|是").unwrap();
}

/// Placeholder replaced with the paper abstract in filter prompts.
pub const ABSTRACT_PLACEHOLDER: &str = "{abstract}";

/// Reading of the model's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationOutcome {
    Interested,
    NotInterested,
    /// Both or neither keyword sets matched, or the provider failed.
    Ambiguous,
}

impl ClassificationOutcome {
    /// Fail-open: only a clean negative drops a paper.
    pub fn keeps_paper(self) -> bool {
        !matches!(self, ClassificationOutcome::NotInterested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub outcome: ClassificationOutcome,
    pub usage: TokenUsage,
}

/// Map a free-text verdict to an outcome.
pub fn interpret_verdict(answer: &str) -> ClassificationOutcome {
    let answer = answer.trim().to_lowercase();

    let positive = POSITIVE_KEYWORDS.is_match(&answer);
    let negative = NEGATIVE_KEYWORDS.is_match(&answer);

    match (positive, negative) {
        (true, false) => ClassificationOutcome::Interested,
        (false, true) => ClassificationOutcome::NotInterested,
        _ => ClassificationOutcome::Ambiguous,
    }
}

pub struct InterestClassifier {
    ai: Arc<dyn BaseAI>,
    model: String,
    temperature: f32,
}

impl InterestClassifier {
    pub fn new(ai: Arc<dyn BaseAI>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            ai,
            model: model.into(),
            temperature,
        }
    }

    /// Classify one abstract against a user's filter prompt. Never fails.
    pub async fn classify(&self, abstract_text: &str, prompt_template: &str) -> Classification {
        let prompt = render_prompt(prompt_template, ABSTRACT_PLACEHOLDER, abstract_text);

        match self.ai.complete(&prompt, &self.model, self.temperature).await {
            Ok(completion) => {
                let outcome = interpret_verdict(&completion.text);
                if outcome == ClassificationOutcome::Ambiguous {
                    warn!(
                        verdict = %completion.text.trim(),
                        "Ambiguous interest verdict, keeping paper"
                    );
                } else {
                    info!(verdict = %completion.text.trim(), outcome = ?outcome, "Interest verdict");
                }
                Classification {
                    outcome,
                    usage: completion.usage,
                }
            }
            Err(e) => {
                warn!(error = %e, "Interest check failed, keeping paper");
                Classification {
                    outcome: ClassificationOutcome::Ambiguous,
                    usage: TokenUsage::default(),
                }
            }
        }
    }
}
