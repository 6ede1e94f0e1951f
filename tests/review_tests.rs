use std::sync::Arc;

use consensus_grader::{
    FixedAgent, ScoringAgent, ScoringOpinion,
    consensus::{ConsensusEngine, ConsensusSettings},
    grade::{AssignmentGrade, AssignmentGrader, GraderSettings},
    review::{GradeAdjustment, ReviewError, ReviewQueue},
    schema::{SampleSchemaStore, SchemaStore},
};

async fn flagged_grade() -> AssignmentGrade {
    let agent = FixedAgent::new("a", ScoringOpinion::new(30.0, "Good grasp", 0.9)).with_criterion(
        "Implementation",
        Ok(ScoringOpinion::new(10.0, "Unclear", 0.1)),
    );
    let agents: Vec<Arc<dyn ScoringAgent>> = vec![Arc::new(agent)];
    let grader = AssignmentGrader::new(
        ConsensusEngine::new(agents, ConsensusSettings::default()),
        GraderSettings::default(),
    );
    let schema = SampleSchemaStore.load("hw1").expect("sample");
    grader
        .grade_assignment("essay", &schema)
        .await
        .expect("graded")
}

fn adjustment(submission_id: &str, points: f64) -> GradeAdjustment {
    GradeAdjustment {
        submission_id:     submission_id.to_string(),
        criterion_name:    "Implementation".into(),
        original_points:   0.0,
        adjusted_points:   points,
        adjustment_reason: "Implementation is correct but terse".into(),
        reviewer:          "ta@example.edu".into(),
    }
}

#[tokio::test]
async fn flagging_records_the_automated_grade() {
    let grade = flagged_grade().await;
    let queue = ReviewQueue::new();

    let id = queue.flag("hw1", "essay", &grade);
    assert!(id.starts_with("sub_"));

    let submission = queue.get(&id).expect("flagged");
    assert_eq!(submission.assignment_id, "hw1");
    assert_eq!(submission.submission_text, "essay");
    assert_eq!(submission.original_grade, 30.0);
    assert_eq!(submission.confidence_score, 0.9);
    assert_eq!(submission.missing_criteria, ["Implementation"]);
    assert!(submission.reviewed_at.is_none());
    assert_eq!(queue.flagged().len(), 1);
}

#[tokio::test]
async fn ids_are_unique() {
    let grade = flagged_grade().await;
    let queue = ReviewQueue::new();
    let a = queue.flag("hw1", "one", &grade);
    let b = queue.flag("hw1", "two", &grade);
    assert_ne!(a, b);
    let texts: Vec<_> = queue
        .flagged()
        .into_iter()
        .map(|s| s.submission_text)
        .collect();
    assert_eq!(texts, ["one", "two"]);
}

#[tokio::test]
async fn adjustments_mark_submissions_reviewed() {
    let grade = flagged_grade().await;
    let queue = ReviewQueue::new();
    let reviewed = queue.flag("hw1", "one", &grade);
    queue.flag("hw1", "two", &grade);

    queue
        .record_adjustment(adjustment(&reviewed, 45.0))
        .expect("recorded");
    queue
        .record_adjustment(adjustment(&reviewed, 50.0))
        .expect("recorded");

    let submission = queue.get(&reviewed).expect("flagged");
    assert!(submission.reviewed_at.is_some());
    assert_eq!(submission.reviewed_by.as_deref(), Some("ta@example.edu"));
    assert_eq!(
        submission.review_notes.as_deref(),
        Some("Implementation is correct but terse")
    );
    assert_eq!(queue.adjustments().len(), 2);

    let stats = queue.statistics();
    assert_eq!(stats.total_flagged, 2);
    assert_eq!(stats.total_reviewed, 1);
    assert_eq!(stats.total_adjustments, 2);
    assert_eq!(stats.review_completion_rate, 0.5);
}

#[tokio::test]
async fn bad_adjustments_are_rejected() {
    let grade = flagged_grade().await;
    let queue = ReviewQueue::new();
    let id = queue.flag("hw1", "one", &grade);

    assert_eq!(
        queue.record_adjustment(adjustment("sub_missing", 10.0)),
        Err(ReviewError::NotFound("sub_missing".into()))
    );
    assert!(matches!(
        queue.record_adjustment(adjustment(&id, f64::NAN)),
        Err(ReviewError::InvalidPoints(_))
    ));
    assert!(queue.adjustments().is_empty());
    assert!(queue.get(&id).expect("flagged").reviewed_at.is_none());
}

#[test]
fn empty_queue_statistics() {
    let stats = ReviewQueue::new().statistics();
    assert_eq!(stats.total_flagged, 0);
    assert_eq!(stats.total_reviewed, 0);
    assert_eq!(stats.total_adjustments, 0);
    assert_eq!(stats.review_completion_rate, 0.0);
}
