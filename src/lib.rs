//! # consensus-grader
//!
//! Scores free-text assignment submissions against a weighted rubric by
//! asking several independent scoring agents for an opinion on every
//! criterion, reconciling those opinions, and deciding whether a human needs
//! to review the result.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Scoring agents and the opinions they produce
pub mod agent;
/// HTTP API for grading and the review queue
pub mod api;
/// Environment-driven runtime configuration
pub mod config;
/// Reconciling opinions into a per-criterion result
pub mod consensus;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// For all things related to grading a whole submission
pub mod grade;
/// Flagged submissions and human grade adjustments
pub mod review;
/// Rubric criteria and schemas
pub mod schema;

pub use agent::{AgentFailure, FixedAgent, ScoringAgent, ScoringOpinion};
pub use consensus::{ConsensusEngine, ConsensusError, ConsensusResult, ConsensusSettings};
pub use grade::{AssignmentGrade, AssignmentGrader, GradeError, GraderSettings};
pub use schema::{GradingCriterion, GradingSchema, SchemaError};
