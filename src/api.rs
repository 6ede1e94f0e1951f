#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! HTTP surface: grading requests and the review queue.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    consensus::ConsensusResult,
    grade::{AssignmentGrade, AssignmentGrader, GradeError},
    review::{GradeAdjustment, ReviewError, ReviewQueue, ReviewStatistics, ReviewSubmission},
    schema::{SchemaLoadError, SchemaStore},
};

/// Everything the handlers share.
pub struct AppState {
    /// Grades submissions
    grader:  AssignmentGrader,
    /// Looks up schemas by assignment id
    schemas: Arc<dyn SchemaStore>,
    /// Flagged submissions and adjustments
    reviews: ReviewQueue,
}

impl AppState {
    /// Creates the state with an empty review queue.
    pub fn new(grader: AssignmentGrader, schemas: Arc<dyn SchemaStore>) -> Self {
        Self {
            grader,
            schemas,
            reviews: ReviewQueue::new(),
        }
    }

    /// Returns the review queue.
    pub fn reviews(&self) -> &ReviewQueue {
        &self.reviews
    }
}

/// Body of `POST /grade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    /// Plain submission text
    pub submission_text: String,
    /// Assignment whose schema to grade against
    pub assignment_id:   String,
}

/// Response of `POST /grade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSummary {
    /// Total awarded points
    pub grade:            f64,
    /// Points the grade is out of
    pub possible_points:  f64,
    /// Overall confidence
    pub confidence:       f64,
    /// Whether the submission was queued for review
    pub needs_review:     bool,
    /// Every criterion name, in schema order
    pub criteria:         Vec<String>,
    /// Reconciled result per criterion
    pub criterion_grades: BTreeMap<String, ConsensusResult>,
    /// Criteria without consensus
    pub missing_criteria: Vec<String>,
    /// Review queue id, when flagged
    pub submission_id:    Option<String>,
}

impl GradeSummary {
    /// Summarises a grade for the wire.
    fn new(grade: AssignmentGrade, submission_id: Option<String>) -> Self {
        Self {
            grade: grade.total_points(),
            possible_points: grade.possible_points(),
            confidence: grade.overall_confidence(),
            needs_review: grade.needs_review(),
            missing_criteria: grade.missing_criteria().to_vec(),
            criteria: grade.criteria,
            criterion_grades: grade.criterion_grades,
            submission_id,
        }
    }
}

/// Acknowledgement of `POST /review-submission`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAck {
    /// Human readable confirmation
    pub message: String,
}

/// Errors surfaced by the handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Schema lookup failed.
    #[error(transparent)]
    Schema(#[from] SchemaLoadError),
    /// The blocking schema lookup panicked or was cancelled.
    #[error("Schema lookup did not finish: {0}")]
    SchemaTask(#[from] tokio::task::JoinError),
    /// Grading could not complete.
    #[error(transparent)]
    Grade(#[from] GradeError),
    /// Review queue operation failed.
    #[error(transparent)]
    Review(#[from] ReviewError),
}

impl ApiError {
    /// Status code for this error.
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Schema(SchemaLoadError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Schema(SchemaLoadError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Schema(SchemaLoadError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Schema(_) | ApiError::SchemaTask(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Grade(_) => StatusCode::BAD_GATEWAY,
            ApiError::Review(ReviewError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Review(ReviewError::InvalidPoints(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/grade", post(grade_submission))
        .route("/flagged-submissions", get(flagged_submissions))
        .route("/review-submission", post(review_submission))
        .route("/review-statistics", get(review_statistics))
        .with_state(state)
}

/// Grades a submission, queueing it for review when needed.
async fn grade_submission(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GradeRequest>,
) -> Result<Json<GradeSummary>, ApiError> {
    let schemas = Arc::clone(&state.schemas);
    let assignment_id = request.assignment_id.clone();
    let schema = tokio::task::spawn_blocking(move || schemas.load(&assignment_id)).await??;
    let grade = state
        .grader
        .grade_assignment(&request.submission_text, &schema)
        .await?;

    let submission_id = grade.needs_review().then(|| {
        state
            .reviews
            .flag(request.assignment_id.clone(), request.submission_text.clone(), &grade)
    });

    Ok(Json(GradeSummary::new(grade, submission_id)))
}

/// Lists every flagged submission.
async fn flagged_submissions(State(state): State<Arc<AppState>>) -> Json<Vec<ReviewSubmission>> {
    Json(state.reviews.flagged())
}

/// Records a reviewer's adjustment.
async fn review_submission(
    State(state): State<Arc<AppState>>,
    Json(adjustment): Json<GradeAdjustment>,
) -> Result<Json<ReviewAck>, ApiError> {
    state.reviews.record_adjustment(adjustment)?;
    Ok(Json(ReviewAck {
        message: String::from("Grade adjustment recorded successfully"),
    }))
}

/// Reports review queue statistics.
async fn review_statistics(State(state): State<Arc<AppState>>) -> Json<ReviewStatistics> {
    Json(state.reviews.statistics())
}
