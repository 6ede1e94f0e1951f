#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoring agents: independent backends that each give one opinion on how a
//! submission fares against a single criterion.

/// Deterministic agent returning a configured outcome.
pub mod fixed;
/// Agent backed by a remote scoring service.
pub mod http;
/// Agent backed by an OpenAI-compatible chat model.
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
pub use fixed::FixedAgent;
pub use http::{HttpAgent, HttpAgentConfig};
pub use openai::{OpenAiAgent, OpenAiAgentConfig};
use serde::{Deserialize, Serialize};

use crate::schema::GradingCriterion;

/// Longest slice of a bad response kept inside an [`AgentFailure`].
const RAW_EXCERPT_LEN: usize = 400;

/// One agent's assessment of one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOpinion {
    /// Points awarded. Agents are asked to stay within the criterion's range
    /// but nothing here enforces it.
    pub points:      f64,
    /// Why the points were awarded
    pub explanation: String,
    /// How sure the agent is, expected within [0, 1]
    pub confidence:  f64,
}

impl ScoringOpinion {
    /// Creates a new opinion.
    pub fn new(points: f64, explanation: impl Into<String>, confidence: f64) -> Self {
        Self {
            points,
            explanation: explanation.into(),
            confidence,
        }
    }
}

/// Ways an agent can fail to produce a well-formed opinion.
///
/// These are system malfunctions, kept apart from low-confidence opinions
/// which are genuine grading uncertainty.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AgentFailure {
    /// The backend could not be reached or returned an error status.
    #[error("Request to scoring backend failed: {0}")]
    Request(String),
    /// The backend answered with nothing usable.
    #[error("Scoring backend returned an empty response")]
    EmptyResponse,
    /// The backend answered but the answer is not an opinion.
    #[error("Could not parse an opinion from the response ({reason}): {raw}")]
    Malformed {
        /// Parser error
        reason: String,
        /// Start of the offending response
        raw:    String,
    },
    /// The opinion fell outside [0, max_points] or [0, 1] and was rejected.
    #[error(
        "Opinion out of range: {points} points (max {max_points}) at confidence {confidence}"
    )]
    OutOfRange {
        /// Points the agent awarded
        points:     f64,
        /// Criterion maximum
        max_points: f64,
        /// Confidence the agent reported
        confidence: f64,
    },
    /// The query did not finish within the configured timeout.
    #[error("Scoring backend did not answer within {0:?}")]
    TimedOut(Duration),
}

/// A backend able to score a submission against one criterion.
///
/// Implementations keep no state across calls beyond their own
/// configuration.
#[async_trait]
pub trait ScoringAgent: Send + Sync {
    /// Stable, human readable identity used in logs.
    fn name(&self) -> &str;

    /// Scores `submission_text` against `criterion`.
    async fn score(
        &self,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<ScoringOpinion, AgentFailure>;
}

/// Extracts a [`ScoringOpinion`] from a backend's free-form reply.
///
/// Accepts a bare JSON object, a fenced code block holding one, or the
/// outermost `{...}` span of surrounding prose.
pub fn parse_opinion(raw: &str) -> Result<ScoringOpinion, AgentFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AgentFailure::EmptyResponse);
    }

    if let Ok(opinion) = serde_json::from_str::<ScoringOpinion>(trimmed) {
        return Ok(opinion);
    }

    let candidate = fenced_block(trimmed)
        .or_else(|| brace_span(trimmed))
        .unwrap_or(trimmed);

    serde_json::from_str::<ScoringOpinion>(candidate).map_err(|e| AgentFailure::Malformed {
        reason: e.to_string(),
        raw:    excerpt(trimmed),
    })
}

/// Body of the first ``` fenced block, with any language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &rest[body_start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// From the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Truncates a response for inclusion in an error, on a char boundary.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(RAW_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
