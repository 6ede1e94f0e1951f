#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Queue of submissions flagged for human review, and the corrections
//! reviewers make.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grade::AssignmentGrade;

/// A submission waiting for, or having had, a human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    /// Identifier handed back to the client when flagged
    pub submission_id:    String,
    /// Assignment the submission was graded for
    pub assignment_id:    String,
    /// The plain submission text
    pub submission_text:  String,
    /// Automated total at the time of flagging
    pub original_grade:   f64,
    /// Automated overall confidence
    pub confidence_score: f64,
    /// Criteria without consensus
    #[serde(default)]
    pub missing_criteria: Vec<String>,
    /// When the submission was flagged
    pub flagged_at:       DateTime<Utc>,
    /// Notes from the latest adjustment
    pub review_notes:     Option<String>,
    /// When the latest adjustment was recorded
    pub reviewed_at:      Option<DateTime<Utc>>,
    /// Who recorded the latest adjustment
    pub reviewed_by:      Option<String>,
}

/// A human correction to one criterion of a flagged submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeAdjustment {
    /// Submission being corrected
    pub submission_id:     String,
    /// Criterion being corrected
    pub criterion_name:    String,
    /// Points before the correction
    pub original_points:   f64,
    /// Points after the correction
    pub adjusted_points:   f64,
    /// Why the points changed
    pub adjustment_reason: String,
    /// Who made the correction
    pub reviewer:          String,
}

/// Derived figures about the review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatistics {
    /// Submissions ever flagged
    pub total_flagged:          usize,
    /// Flagged submissions with at least one adjustment
    pub total_reviewed:         usize,
    /// Adjustments recorded
    pub total_adjustments:      usize,
    /// `total_reviewed / total_flagged`, 0 when nothing was flagged
    pub review_completion_rate: f64,
}

/// Errors from review queue operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    /// No flagged submission has this id.
    #[error("Submission `{0}` not found")]
    NotFound(String),
    /// Adjusted points must be a finite number.
    #[error("Adjusted points must be a finite number, got {0}")]
    InvalidPoints(f64),
}

/// Backing data of a [`ReviewQueue`].
#[derive(Debug, Default)]
struct QueueState {
    /// Flagged submissions in the order they were flagged
    submissions: Vec<ReviewSubmission>,
    /// Adjustments in the order they were recorded
    adjustments: Vec<GradeAdjustment>,
}

/// In-memory review queue.
///
/// Owned by whoever serves the API and shared by reference; all access goes
/// through one mutex.
#[derive(Debug, Default)]
pub struct ReviewQueue {
    /// Queue contents
    state: Mutex<QueueState>,
}

impl ReviewQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a graded submission to the queue and returns its id.
    pub fn flag(
        &self,
        assignment_id: impl Into<String>,
        submission_text: impl Into<String>,
        grade: &AssignmentGrade,
    ) -> String {
        let submission_id = format!("sub_{}", Uuid::new_v4().simple());
        let submission = ReviewSubmission {
            submission_id:    submission_id.clone(),
            assignment_id:    assignment_id.into(),
            submission_text:  submission_text.into(),
            original_grade:   grade.total_points(),
            confidence_score: grade.overall_confidence(),
            missing_criteria: grade.missing_criteria().to_vec(),
            flagged_at:       Utc::now(),
            review_notes:     None,
            reviewed_at:      None,
            reviewed_by:      None,
        };

        tracing::info!(submission_id = %submission_id, "Flagged submission for review");
        self.state
            .lock()
            .expect("review queue poisoned")
            .submissions
            .push(submission);
        submission_id
    }

    /// Returns every flagged submission, oldest first.
    pub fn flagged(&self) -> Vec<ReviewSubmission> {
        self.state
            .lock()
            .expect("review queue poisoned")
            .submissions
            .clone()
    }

    /// Returns one flagged submission.
    pub fn get(&self, submission_id: &str) -> Option<ReviewSubmission> {
        self.state
            .lock()
            .expect("review queue poisoned")
            .submissions
            .iter()
            .find(|s| s.submission_id == submission_id)
            .cloned()
    }

    /// Returns the adjustments recorded so far.
    pub fn adjustments(&self) -> Vec<GradeAdjustment> {
        self.state
            .lock()
            .expect("review queue poisoned")
            .adjustments
            .clone()
    }

    /// Records an adjustment and marks its submission reviewed.
    pub fn record_adjustment(&self, adjustment: GradeAdjustment) -> Result<(), ReviewError> {
        if !adjustment.adjusted_points.is_finite() {
            return Err(ReviewError::InvalidPoints(adjustment.adjusted_points));
        }

        let mut state = self.state.lock().expect("review queue poisoned");
        let submission = state
            .submissions
            .iter_mut()
            .find(|s| s.submission_id == adjustment.submission_id)
            .ok_or_else(|| ReviewError::NotFound(adjustment.submission_id.clone()))?;

        submission.reviewed_at = Some(Utc::now());
        submission.reviewed_by = Some(adjustment.reviewer.clone());
        submission.review_notes = Some(adjustment.adjustment_reason.clone());

        tracing::info!(
            submission_id = %adjustment.submission_id,
            criterion = %adjustment.criterion_name,
            from = adjustment.original_points,
            to = adjustment.adjusted_points,
            "Recorded grade adjustment"
        );
        state.adjustments.push(adjustment);
        Ok(())
    }

    /// Computes the queue statistics.
    pub fn statistics(&self) -> ReviewStatistics {
        let state = self.state.lock().expect("review queue poisoned");
        let total_flagged = state.submissions.len();
        let total_reviewed = state
            .submissions
            .iter()
            .filter(|s| s.reviewed_at.is_some())
            .count();

        ReviewStatistics {
            total_flagged,
            total_reviewed,
            total_adjustments: state.adjustments.len(),
            review_completion_rate: if total_flagged > 0 {
                total_reviewed as f64 / total_flagged as f64
            } else {
                0.0
            },
        }
    }
}
