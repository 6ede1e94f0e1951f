use std::path::PathBuf;

use consensus_grader::schema::{
    DirectorySchemaStore, GradingCriterion, GradingSchema, InMemorySchemaStore, SampleSchemaStore,
    SchemaError, SchemaLoadError, SchemaStore, store::load_schema_file,
};

fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("schemas")
}

fn criterion(name: &str, max_points: f64) -> GradingCriterion {
    GradingCriterion::builder()
        .name(name)
        .max_points(max_points)
        .build()
}

#[test]
fn schema_with_matching_total_validates() {
    let mut schema = GradingSchema::new("Essay", 100.0);
    schema
        .add_criterion(criterion("Understanding", 40.0))
        .expect("first criterion fits");
    schema
        .add_criterion(criterion("Implementation", 60.0))
        .expect("second criterion fits");

    assert_eq!(schema.allocated_points(), 100.0);
    assert!(schema.validate().is_ok());
    let names: Vec<_> = schema.criteria().iter().map(|c| c.name()).collect();
    assert_eq!(names, ["Understanding", "Implementation"]);
}

#[test]
fn overflowing_criterion_is_rejected_and_schema_unchanged() {
    let mut schema = GradingSchema::new("Essay", 100.0);
    schema
        .add_criterion(criterion("A", 60.0))
        .expect("fits");

    let err = schema
        .add_criterion(criterion("B", 60.0))
        .expect_err("120 > 100");
    assert_eq!(
        err,
        SchemaError::Overflow {
            criterion:    "B".into(),
            max_points:   60.0,
            attempted:    120.0,
            total_points: 100.0,
        }
    );
    assert_eq!(schema.criteria().len(), 1);
    assert_eq!(schema.allocated_points(), 60.0);
}

#[test]
fn filling_the_total_exactly_is_allowed() {
    let mut schema = GradingSchema::new("Quiz", 10.0);
    schema.add_criterion(criterion("Q1", 2.5)).expect("fits");
    schema.add_criterion(criterion("Q2", 7.5)).expect("fits");
    assert!(schema.validate().is_ok());
}

#[test]
fn under_allocated_schema_fails_validation() {
    let mut schema = GradingSchema::new("Lab", 100.0);
    schema.add_criterion(criterion("Correctness", 90.0)).expect("fits");

    let err = schema.validate().expect_err("90 != 100");
    assert_eq!(
        err,
        SchemaError::Inconsistent {
            allocated:    90.0,
            total_points: 100.0,
        }
    );
    assert!(err.to_string().contains("don't match"));
}

#[test]
fn empty_schema_is_not_valid() {
    let schema = GradingSchema::new("Empty", 10.0);
    assert!(matches!(
        schema.validate(),
        Err(SchemaError::Inconsistent { allocated, .. }) if allocated == 0.0
    ));
}

#[test]
fn duplicate_names_are_rejected() {
    let mut schema = GradingSchema::new("Lab", 100.0);
    schema.add_criterion(criterion("Style", 10.0)).expect("fits");

    let err = schema
        .add_criterion(criterion("Style", 10.0))
        .expect_err("duplicate");
    assert_eq!(err, SchemaError::DuplicateCriterion("Style".into()));
    assert_eq!(schema.criteria().len(), 1);
}

#[test]
fn non_positive_points_are_rejected() {
    let mut schema = GradingSchema::new("Lab", 100.0);
    for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let err = schema
            .add_criterion(criterion("Bad", bad))
            .expect_err("invalid points");
        assert!(matches!(err, SchemaError::InvalidPoints { .. }));
    }
    assert!(schema.criteria().is_empty());
}

#[test]
fn rubric_lines_sort_highest_label_first() {
    let c = GradingCriterion::builder()
        .name("Understanding")
        .max_points(40.0)
        .rubric([
            ("10", "Limited"),
            ("40", "Excellent"),
            ("5", "Minimal"),
            ("n/a", "Not attempted"),
        ])
        .build();

    assert_eq!(
        c.rubric_lines(),
        "- 40: Excellent\n- 10: Limited\n- 5: Minimal\n- n/a: Not attempted"
    );
}

#[test]
fn schema_file_loads_and_validates() {
    let schema = load_schema_file(schema_dir().join("essay-1.json")).expect("valid fixture");

    assert_eq!(schema.name(), "Essay 1: Sorting Algorithms");
    assert_eq!(schema.total_points(), 100.0);
    let understanding = schema.get("Understanding").expect("criterion present");
    assert_eq!(understanding.max_points(), 40.0);
    assert_eq!(understanding.rubric().len(), 4);
    assert!(schema.get("Style").is_none());
}

#[test]
fn schema_file_that_overflows_is_invalid() {
    let err = load_schema_file(schema_dir().join("overflow.json")).expect_err("overflow");
    assert!(
        matches!(
            err,
            SchemaLoadError::Invalid(SchemaError::Overflow { ref criterion, .. }) if criterion == "Tests"
        ),
        "{err:?}"
    );
}

#[test]
fn schema_file_with_duplicates_is_invalid() {
    let err = load_schema_file(schema_dir().join("duplicate.json")).expect_err("duplicate");
    assert!(matches!(
        err,
        SchemaLoadError::Invalid(SchemaError::DuplicateCriterion(ref name)) if name == "Correctness"
    ));
}

#[test]
fn direct_deserialization_still_enforces_insertion_rules() {
    let json = r#"{"name": "Lab", "total_points": 10, "criteria": [
        {"name": "A", "max_points": 6}, {"name": "B", "max_points": 6}
    ]}"#;
    let err = serde_json::from_str::<GradingSchema>(json).expect_err("overflow");
    assert!(err.to_string().contains("exceeding"), "{err}");
}

#[test]
fn schema_file_that_does_not_add_up_is_invalid() {
    let err = load_schema_file(schema_dir().join("short-total.json")).expect_err("short");
    assert!(matches!(
        err,
        SchemaLoadError::Invalid(SchemaError::Inconsistent { .. })
    ));
}

#[test]
fn broken_json_is_a_parse_error() {
    let err = load_schema_file(schema_dir().join("broken.json")).expect_err("broken");
    assert!(matches!(err, SchemaLoadError::Parse { .. }));
}

#[test]
fn directory_store_resolves_assignment_ids() {
    let store = DirectorySchemaStore::new(schema_dir());

    let schema = store.load("essay-1").expect("fixture exists");
    assert_eq!(schema.criteria().len(), 2);

    assert!(matches!(
        store.load("does-not-exist"),
        Err(SchemaLoadError::NotFound(id)) if id == "does-not-exist"
    ));
    for bad in ["../secrets", "", ".hidden", "a/b"] {
        assert!(
            matches!(store.load(bad), Err(SchemaLoadError::InvalidId(_))),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn in_memory_store_only_accepts_valid_schemas() {
    let mut store = InMemorySchemaStore::new();

    let mut incomplete = GradingSchema::new("Lab", 100.0);
    incomplete.add_criterion(criterion("Correctness", 50.0)).expect("fits");
    assert!(store.insert("lab", incomplete).is_err());
    assert!(matches!(store.load("lab"), Err(SchemaLoadError::NotFound(_))));

    let mut complete = GradingSchema::new("Lab", 100.0);
    complete.add_criterion(criterion("Correctness", 100.0)).expect("fits");
    store.insert("lab", complete.clone()).expect("valid");
    assert_eq!(store.load("lab").expect("stored"), complete);
}

#[test]
fn sample_store_serves_the_demo_rubric() {
    let schema = SampleSchemaStore.load("hw1").expect("sample");
    assert_eq!(schema.name(), "Assignment hw1");
    assert_eq!(schema.total_points(), 100.0);
    assert_eq!(schema.get("Understanding").map(|c| c.max_points()), Some(40.0));
    assert_eq!(schema.get("Implementation").map(|c| c.max_points()), Some(60.0));
    assert!(schema.validate().is_ok());
}

#[test]
fn schema_round_trips_through_json() {
    let schema = SampleSchemaStore.load("hw2").expect("sample");
    let json = serde_json::to_string(&schema).expect("serialize");
    let back: GradingSchema = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, schema);
}
