#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Drives consensus across a whole schema.
pub mod grader;
/// The assignment grade and its rendering.
pub mod results;

pub use grader::{AssignmentGrader, GradeError, GraderSettings, MissingCriterionPolicy};
pub use results::AssignmentGrade;
