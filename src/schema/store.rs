#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use super::{GradingCriterion, GradingSchema, RawSchema, SchemaError};

/// Errors from looking up or loading a schema.
#[derive(thiserror::Error, Debug)]
pub enum SchemaLoadError {
    /// No schema is known for the assignment.
    #[error("No grading schema found for assignment `{0}`")]
    NotFound(String),
    /// The assignment id cannot be used as a lookup key.
    #[error("Invalid assignment id: `{0}`")]
    InvalidId(String),
    /// The schema file could not be read.
    #[error("Could not read schema file {path}")]
    Io {
        /// Path of the schema file
        path:   PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// The schema file is not valid JSON or not shaped like a schema.
    #[error("Could not parse schema file {path}: {source}")]
    Parse {
        /// Path of the schema file
        path:   PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
    /// The schema breaks a schema rule: an insertion check or the points
    /// total.
    #[error(transparent)]
    Invalid(#[from] SchemaError),
}

/// Source of validated grading schemas, keyed by assignment id.
///
/// Every implementation returns schemas that have already passed
/// [`GradingSchema::validate`]. `load` may block on file IO; async callers
/// run it on the blocking pool.
pub trait SchemaStore: Send + Sync {
    /// Loads the schema for `assignment_id`.
    fn load(&self, assignment_id: &str) -> Result<GradingSchema, SchemaLoadError>;
}

/// Reads a single schema from a JSON file and validates it.
///
/// Syntax errors surface as [`SchemaLoadError::Parse`]; every broken schema
/// rule, whether caught while inserting criteria or by the final total check,
/// surfaces as [`SchemaLoadError::Invalid`].
pub fn load_schema_file(path: impl AsRef<Path>) -> Result<GradingSchema, SchemaLoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawSchema = serde_json::from_str(&contents).map_err(|source| SchemaLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let schema = GradingSchema::try_from(raw)?;
    schema.validate()?;
    Ok(schema)
}

/// Loads `<root>/<assignment_id>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySchemaStore {
    /// Directory holding one JSON file per assignment
    root: PathBuf,
}

impl DirectorySchemaStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory this store reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SchemaStore for DirectorySchemaStore {
    fn load(&self, assignment_id: &str) -> Result<GradingSchema, SchemaLoadError> {
        let valid_id = !assignment_id.is_empty()
            && assignment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !assignment_id.starts_with('.');
        if !valid_id {
            return Err(SchemaLoadError::InvalidId(assignment_id.to_string()));
        }

        let path = self.root.join(format!("{assignment_id}.json"));
        if !path.exists() {
            return Err(SchemaLoadError::NotFound(assignment_id.to_string()));
        }
        load_schema_file(path)
    }
}

/// Schemas held in memory, validated on insertion.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    /// Schemas by assignment id
    schemas: HashMap<String, GradingSchema>,
}

impl InMemorySchemaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a schema for `assignment_id`.
    pub fn insert(
        &mut self,
        assignment_id: impl Into<String>,
        schema: GradingSchema,
    ) -> Result<(), SchemaError> {
        schema.validate()?;
        self.schemas.insert(assignment_id.into(), schema);
        Ok(())
    }
}

impl SchemaStore for InMemorySchemaStore {
    fn load(&self, assignment_id: &str) -> Result<GradingSchema, SchemaLoadError> {
        self.schemas
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| SchemaLoadError::NotFound(assignment_id.to_string()))
    }
}

/// Serves the same demo rubric for every assignment id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleSchemaStore;

impl SchemaStore for SampleSchemaStore {
    fn load(&self, assignment_id: &str) -> Result<GradingSchema, SchemaLoadError> {
        Ok(sample_schema(assignment_id)?)
    }
}

/// A 100 point rubric split between conceptual understanding (40) and
/// implementation quality (60).
pub fn sample_schema(assignment_id: &str) -> Result<GradingSchema, SchemaError> {
    let mut schema = GradingSchema::new(format!("Assignment {assignment_id}"), 100.0);

    schema.add_criterion(
        GradingCriterion::builder()
            .name("Understanding")
            .description("Demonstrates understanding of core concepts")
            .max_points(40.0)
            .rubric([
                ("40", "Excellent understanding"),
                ("30", "Good understanding"),
                ("20", "Fair understanding"),
                ("10", "Limited understanding"),
                ("0", "No understanding shown"),
            ])
            .build(),
    )?;
    schema.add_criterion(
        GradingCriterion::builder()
            .name("Implementation")
            .description("Quality of implementation")
            .max_points(60.0)
            .rubric([
                ("60", "Excellent implementation"),
                ("45", "Good implementation"),
                ("30", "Fair implementation"),
                ("15", "Poor implementation"),
                ("0", "No implementation"),
            ])
            .build(),
    )?;

    schema.validate()?;
    Ok(schema)
}
