#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Rubric criteria and the bounded-total schema that groups them.

/// A single rubric criterion.
pub mod criterion;
/// Loading schemas by assignment id.
pub mod store;

pub use criterion::GradingCriterion;
use serde::{Deserialize, Serialize};
pub use store::{
    DirectorySchemaStore, InMemorySchemaStore, SampleSchemaStore, SchemaLoadError, SchemaStore,
};

/// An enum to represent problems with how a schema is put together
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Adding the criterion would push the allocated points past the total.
    #[error(
        "Adding `{criterion}` ({max_points} points) would allocate {attempted} points, exceeding \
         the schema total of {total_points}"
    )]
    Overflow {
        /// Name of the rejected criterion
        criterion:    String,
        /// Points the rejected criterion asked for
        max_points:   f64,
        /// Allocated points had the criterion been accepted
        attempted:    f64,
        /// The schema's fixed total
        total_points: f64,
    },
    /// The criteria do not add up to the schema total.
    #[error("Total points ({allocated}) don't match expected total ({total_points})")]
    Inconsistent {
        /// Sum of max points across all criteria
        allocated:    f64,
        /// The schema's fixed total
        total_points: f64,
    },
    /// A criterion with this name already exists in the schema.
    #[error("A criterion named `{0}` already exists in this schema")]
    DuplicateCriterion(String),
    /// Max points must be a positive, finite number.
    #[error("Criterion `{criterion}` has invalid max points: {max_points}")]
    InvalidPoints {
        /// Name of the rejected criterion
        criterion:  String,
        /// The offending value
        max_points: f64,
    },
}

/// The serialized shape of a schema, replayed through
/// [`GradingSchema::add_criterion`] on load.
#[derive(Deserialize)]
struct RawSchema {
    /// Schema name
    name:         String,
    /// Fixed total
    total_points: f64,
    /// Criteria in order
    #[serde(default)]
    criteria:     Vec<GradingCriterion>,
}

/// The complete grading schema for an assignment.
///
/// Points are checked in two phases: [`GradingSchema::add_criterion`] refuses
/// to let the allocated points exceed `total_points`, and
/// [`GradingSchema::validate`] requires them to match it exactly. The grader
/// never calls `validate` on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct GradingSchema {
    /// Name of the schema, usually the assignment title
    name:         String,
    /// The fixed ceiling all criteria must share
    total_points: f64,
    /// Criteria, in insertion order
    criteria:     Vec<GradingCriterion>,
}

impl TryFrom<RawSchema> for GradingSchema {
    type Error = SchemaError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let mut schema = GradingSchema::new(raw.name, raw.total_points);
        for criterion in raw.criteria {
            schema.add_criterion(criterion)?;
        }
        Ok(schema)
    }
}

impl GradingSchema {
    /// Creates an empty schema.
    pub fn new(name: impl Into<String>, total_points: f64) -> Self {
        Self {
            name: name.into(),
            total_points,
            criteria: Vec::new(),
        }
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fixed total.
    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    /// Returns the criteria in insertion order.
    pub fn criteria(&self) -> &[GradingCriterion] {
        &self.criteria
    }

    /// Looks up a criterion by name.
    pub fn get(&self, name: &str) -> Option<&GradingCriterion> {
        self.criteria.iter().find(|c| c.name() == name)
    }

    /// Sum of max points across the criteria added so far.
    pub fn allocated_points(&self) -> f64 {
        self.criteria.iter().map(GradingCriterion::max_points).sum()
    }

    /// Appends a criterion.
    ///
    /// Fails without touching the schema if the criterion's points are not
    /// positive, its name is taken, or the allocated points would exceed the
    /// total.
    pub fn add_criterion(&mut self, criterion: GradingCriterion) -> Result<(), SchemaError> {
        if !criterion.max_points().is_finite() || criterion.max_points() <= 0.0 {
            return Err(SchemaError::InvalidPoints {
                criterion:  criterion.name().to_string(),
                max_points: criterion.max_points(),
            });
        }
        if self.get(criterion.name()).is_some() {
            return Err(SchemaError::DuplicateCriterion(criterion.name().to_string()));
        }

        let attempted = self.allocated_points() + criterion.max_points();
        if attempted > self.total_points {
            return Err(SchemaError::Overflow {
                criterion: criterion.name().to_string(),
                max_points: criterion.max_points(),
                attempted,
                total_points: self.total_points,
            });
        }

        self.criteria.push(criterion);
        Ok(())
    }

    /// Checks that the criteria add up to exactly the schema total.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let allocated = self.allocated_points();
        if allocated != self.total_points {
            return Err(SchemaError::Inconsistent {
                allocated,
                total_points: self.total_points,
            });
        }
        Ok(())
    }
}
