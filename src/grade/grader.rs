#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, str::FromStr};

use bon::Builder;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use super::results::AssignmentGrade;
use crate::{
    consensus::{ConsensusEngine, ConsensusError, round2},
    constants::DEFAULT_CONFIDENCE_THRESHOLD,
    schema::GradingSchema,
};

/// How a criterion without consensus counts towards the grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCriterionPolicy {
    /// Leave it out of both the total and the possible points.
    #[default]
    Omit,
    /// Count it as zero points out of its max points.
    ScoreZero,
}

impl FromStr for MissingCriterionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(MissingCriterionPolicy::Omit),
            "zero" | "score_zero" => Ok(MissingCriterionPolicy::ScoreZero),
            other => anyhow::bail!("Unknown missing criterion policy `{other}`"),
        }
    }
}

/// Tunables for an [`AssignmentGrader`].
#[derive(Debug, Clone, Builder)]
pub struct GraderSettings {
    /// Criterion results below this confidence flag the submission for
    /// review. Independent of the engine's own minimum.
    #[builder(default = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f64,
    /// How criteria without consensus are counted
    #[builder(default)]
    missing_policy:       MissingCriterionPolicy,
}

impl Default for GraderSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GraderSettings {
    /// Returns the review threshold.
    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Returns the missing-criterion policy.
    pub fn missing_policy(&self) -> MissingCriterionPolicy {
        self.missing_policy
    }
}

/// Fatal problems while grading a submission.
#[derive(thiserror::Error, Debug, Clone)]
pub enum GradeError {
    /// A criterion could not be scored at all.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

/// Grades whole submissions by seeking consensus on every criterion of a
/// schema.
#[derive(Debug, Clone)]
pub struct AssignmentGrader {
    /// Per-criterion consensus
    engine:   ConsensusEngine,
    /// Grader tunables
    settings: GraderSettings,
}

impl AssignmentGrader {
    /// Creates a grader.
    pub fn new(engine: ConsensusEngine, settings: GraderSettings) -> Self {
        Self { engine, settings }
    }

    /// Returns the consensus engine.
    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Returns the grader settings.
    pub fn settings(&self) -> &GraderSettings {
        &self.settings
    }

    /// Grades `submission_text` against every criterion of `schema`.
    ///
    /// Criteria are scored concurrently and folded in schema order. Missing
    /// consensus or low confidence only sets `needs_review`; the call fails
    /// only when some criterion had no reachable agent. The schema is not
    /// validated here.
    pub async fn grade_assignment(
        &self,
        submission_text: &str,
        schema: &GradingSchema,
    ) -> Result<AssignmentGrade, GradeError> {
        tracing::info!(
            schema = schema.name(),
            criteria = schema.criteria().len(),
            agents = self.engine.agents().len(),
            "Grading submission"
        );

        let results = try_join_all(
            schema
                .criteria()
                .iter()
                .map(|criterion| self.engine.grade_with_consensus(submission_text, criterion)),
        )
        .await?;

        let mut total_points = 0.0;
        let mut possible_points = 0.0;
        let mut confidences = Vec::new();
        let mut criterion_grades = BTreeMap::new();
        let mut missing_criteria = Vec::new();
        let mut low_confidence = Vec::new();

        for (criterion, result) in schema.criteria().iter().zip(results) {
            let Some(result) = result else {
                missing_criteria.push(criterion.name().to_string());
                if self.settings.missing_policy == MissingCriterionPolicy::ScoreZero {
                    possible_points += criterion.max_points();
                }
                continue;
            };

            total_points += result.points();
            possible_points += criterion.max_points();
            confidences.push(result.confidence());
            if result.confidence() < self.settings.confidence_threshold {
                low_confidence.push(criterion.name().to_string());
            }
            criterion_grades.insert(criterion.name().to_string(), result);
        }

        let overall_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        let needs_review = !missing_criteria.is_empty() || !low_confidence.is_empty();

        if needs_review {
            tracing::warn!(
                schema = schema.name(),
                missing = ?missing_criteria,
                low_confidence = ?low_confidence,
                "Submission flagged for review"
            );
        }

        Ok(AssignmentGrade {
            criteria: schema.criteria().iter().map(|c| c.name().to_string()).collect(),
            total_points: round2(total_points),
            possible_points,
            criterion_grades,
            overall_confidence,
            needs_review,
            missing_criteria,
            low_confidence,
        })
    }
}
