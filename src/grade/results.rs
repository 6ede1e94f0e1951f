#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::consensus::ConsensusResult;

/// The graded outcome of one submission against one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentGrade {
    /// Every criterion name, in schema order
    pub(crate) criteria:           Vec<String>,
    /// Sum of reconciled points over criteria that reached consensus
    pub(crate) total_points:       f64,
    /// Points the total is out of, given the missing-criterion policy
    pub(crate) possible_points:    f64,
    /// Reconciled result per criterion that reached consensus
    pub(crate) criterion_grades:   BTreeMap<String, ConsensusResult>,
    /// Mean confidence over `criterion_grades`, 0 when empty
    pub(crate) overall_confidence: f64,
    /// Whether a human must look at this submission
    pub(crate) needs_review:       bool,
    /// Criteria without consensus, in schema order
    pub(crate) missing_criteria:   Vec<String>,
    /// Criteria that reached consensus below the review threshold, in
    /// schema order
    pub(crate) low_confidence:     Vec<String>,
}

impl AssignmentGrade {
    /// Returns the total awarded points.
    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    /// Returns the points the total is out of.
    pub fn possible_points(&self) -> f64 {
        self.possible_points
    }

    /// Returns every criterion name in schema order, graded or not.
    pub fn criteria(&self) -> &[String] {
        &self.criteria
    }

    /// Returns the reconciled result per criterion, keyed by name.
    pub fn criterion_grades(&self) -> &BTreeMap<String, ConsensusResult> {
        &self.criterion_grades
    }

    /// Returns the result for one criterion, if it reached consensus.
    pub fn criterion(&self, name: &str) -> Option<&ConsensusResult> {
        self.criterion_grades.get(name)
    }

    /// Returns the mean per-criterion confidence.
    pub fn overall_confidence(&self) -> f64 {
        self.overall_confidence
    }

    /// Returns whether a human must review this grade.
    pub fn needs_review(&self) -> bool {
        self.needs_review
    }

    /// Returns the criteria that did not reach consensus.
    pub fn missing_criteria(&self) -> &[String] {
        &self.missing_criteria
    }

    /// Returns the criteria whose consensus confidence was too low.
    pub fn low_confidence(&self) -> &[String] {
        &self.low_confidence
    }

    /// Total as a percentage of the possible points, if any were possible.
    pub fn percentage(&self) -> Option<f64> {
        (self.possible_points > 0.0).then(|| self.total_points / self.possible_points * 100.0)
    }

    /// Renders the per-criterion results as a table, one row per criterion
    /// in schema order.
    pub fn table(&self) -> String {
        let rows = self.criteria.iter().map(|name| match self.criterion_grades.get(name) {
            Some(result) => CriterionRow {
                criterion:   name.clone(),
                points:      format!("{:.2}", result.points()),
                confidence:  format!("{:.2}", result.confidence()),
                explanation: result.explanation().to_string(),
            },
            None => CriterionRow {
                criterion:   name.clone(),
                points:      String::from("-"),
                confidence:  String::from("-"),
                explanation: String::from("No consensus, needs human review"),
            },
        });

        Table::new(rows)
            .with(Panel::header("Grading Overview"))
            .with(Panel::footer(format!(
                "Total: {:.2}/{:.2}",
                self.total_points, self.possible_points
            )))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(48).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}

impl Display for AssignmentGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}/{:.2} (confidence {:.2}){}",
            self.total_points,
            self.possible_points,
            self.overall_confidence,
            if self.needs_review {
                ", needs review"
            } else {
                ""
            }
        )
    }
}

/// One line of the results table.
#[derive(Tabled)]
struct CriterionRow {
    /// Criterion name
    #[tabled(rename = "Criterion")]
    criterion:   String,
    /// Reconciled points
    #[tabled(rename = "Points")]
    points:      String,
    /// Consensus confidence
    #[tabled(rename = "Confidence")]
    confidence:  String,
    /// Combined explanation
    #[tabled(rename = "Explanation")]
    explanation: String,
}
