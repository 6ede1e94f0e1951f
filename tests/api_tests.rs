use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use consensus_grader::{
    agent::{AgentFailure, FixedAgent, ScoringAgent, ScoringOpinion},
    api::{AppState, GradeSummary, ReviewAck, router},
    consensus::{ConsensusEngine, ConsensusSettings},
    grade::{AssignmentGrader, GraderSettings},
    review::{ReviewStatistics, ReviewSubmission},
    schema::{
        DirectorySchemaStore, GradingSchema, InMemorySchemaStore, SchemaLoadError, SchemaStore,
        store::sample_schema,
    },
};
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Confident on Understanding, unsure on Implementation.
fn split_agent() -> Arc<dyn ScoringAgent> {
    Arc::new(
        FixedAgent::new("stub", ScoringOpinion::new(30.0, "Good grasp", 0.9)).with_criterion(
            "Implementation",
            Ok(ScoringOpinion::new(50.0, "Hard to tell", 0.4)),
        ),
    )
}

fn confident_agent() -> Arc<dyn ScoringAgent> {
    Arc::new(FixedAgent::new("stub", ScoringOpinion::new(30.0, "Clear", 0.95)))
}

fn sample_store() -> Arc<dyn SchemaStore> {
    let mut store = InMemorySchemaStore::new();
    store
        .insert("hw1", sample_schema("hw1").expect("sample"))
        .expect("valid");
    Arc::new(store)
}

/// Blocks its caller's thread on every lookup, like a store on a slow disk.
struct SlowDiskStore(Duration);

impl SchemaStore for SlowDiskStore {
    fn load(&self, assignment_id: &str) -> Result<GradingSchema, SchemaLoadError> {
        std::thread::sleep(self.0);
        Ok(sample_schema(assignment_id)?)
    }
}

fn state(agent: Arc<dyn ScoringAgent>, schemas: Arc<dyn SchemaStore>) -> Arc<AppState> {
    let grader = AssignmentGrader::new(
        ConsensusEngine::new(vec![agent], ConsensusSettings::default()),
        GraderSettings::default(),
    );
    Arc::new(AppState::new(grader, schemas))
}

/// Serves the API on an ephemeral port and returns its base URL.
async fn spawn(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn post_grade(base: &str, assignment_id: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/grade"))
        .json(&json!({
            "submission_text": "Merge sort splits the input in half.",
            "assignment_id": assignment_id,
        }))
        .send()
        .await
        .expect("request sent")
}

#[tokio::test]
async fn flagged_grade_flows_through_review() {
    let base = spawn(state(split_agent(), sample_store())).await;
    let client = reqwest::Client::new();

    let response = post_grade(&base, "hw1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: GradeSummary = response.json().await.expect("summary");
    assert!(summary.needs_review);
    assert_eq!(summary.grade, 30.0);
    assert_eq!(summary.possible_points, 40.0);
    assert_eq!(summary.missing_criteria, ["Implementation"]);
    assert!(summary.criterion_grades.contains_key("Understanding"));
    assert_eq!(summary.criteria, ["Understanding", "Implementation"]);
    let submission_id = summary.submission_id.expect("queued for review");

    let flagged: Vec<ReviewSubmission> = client
        .get(format!("{base}/flagged-submissions"))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("flagged list");
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].submission_id, submission_id);
    assert_eq!(flagged[0].assignment_id, "hw1");

    let response = client
        .post(format!("{base}/review-submission"))
        .json(&json!({
            "submission_id": submission_id,
            "criterion_name": "Implementation",
            "original_points": 0.0,
            "adjusted_points": 48.0,
            "adjustment_reason": "Works, needs comments",
            "reviewer": "ta",
        }))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::OK);
    let ack: ReviewAck = response.json().await.expect("ack");
    assert_eq!(ack.message, "Grade adjustment recorded successfully");

    let stats: ReviewStatistics = client
        .get(format!("{base}/review-statistics"))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("statistics");
    assert_eq!(stats.total_flagged, 1);
    assert_eq!(stats.total_reviewed, 1);
    assert_eq!(stats.total_adjustments, 1);
    assert_eq!(stats.review_completion_rate, 1.0);
}

#[tokio::test]
async fn confident_grade_is_not_queued() {
    let base = spawn(state(confident_agent(), sample_store())).await;

    let summary: GradeSummary = post_grade(&base, "hw1")
        .await
        .json()
        .await
        .expect("summary");
    assert!(!summary.needs_review);
    assert!(summary.submission_id.is_none());
    assert_eq!(summary.grade, 60.0);
    assert_eq!(summary.possible_points, 100.0);

    let flagged: Vec<Value> = reqwest::get(format!("{base}/flagged-submissions"))
        .await
        .expect("request sent")
        .json()
        .await
        .expect("flagged list");
    assert!(flagged.is_empty());
}

#[tokio::test]
async fn unknown_assignment_is_not_found() {
    let base = spawn(state(confident_agent(), sample_store())).await;

    let response = post_grade(&base, "hw9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("error body");
    assert!(body["detail"].as_str().expect("detail").contains("hw9"));
}

#[tokio::test]
async fn schema_problems_map_to_client_errors() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("schemas");
    let base = spawn(state(confident_agent(), Arc::new(DirectorySchemaStore::new(dir)))).await;

    assert_eq!(post_grade(&base, "essay-1").await.status(), StatusCode::OK);
    assert_eq!(
        post_grade(&base, "../essay-1").await.status(),
        StatusCode::BAD_REQUEST
    );
    for broken_rule in ["short-total", "overflow", "duplicate"] {
        assert_eq!(
            post_grade(&base, broken_rule).await.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "{broken_rule}"
        );
    }
    assert_eq!(
        post_grade(&base, "broken").await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn agent_outage_is_a_bad_gateway() {
    let down: Arc<dyn ScoringAgent> = Arc::new(FixedAgent::failing(
        "down",
        AgentFailure::Request("connection refused".into()),
    ));
    let base = spawn(state(down, sample_store())).await;

    let response = post_grade(&base, "hw1").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.expect("error body");
    assert!(
        body["detail"]
            .as_str()
            .expect("detail")
            .contains("scoring agents failed")
    );
}

#[tokio::test]
async fn adjusting_an_unknown_submission_is_not_found() {
    let base = spawn(state(confident_agent(), sample_store())).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/review-submission"))
        .json(&json!({
            "submission_id": "sub_missing",
            "criterion_name": "Implementation",
            "original_points": 0.0,
            "adjusted_points": 10.0,
            "adjustment_reason": "n/a",
            "reviewer": "ta",
        }))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn slow_schema_lookups_do_not_stall_other_requests() {
    let store = Arc::new(SlowDiskStore(Duration::from_millis(500)));
    let base = spawn(state(confident_agent(), store)).await;
    let started = Instant::now();

    let grading = tokio::spawn({
        let base = base.clone();
        async move { post_grade(&base, "hw1").await.status() }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = reqwest::get(format!("{base}/review-statistics"))
        .await
        .expect("request sent");
    assert_eq!(stats.status(), StatusCode::OK);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "statistics waited {:?} on a schema lookup",
        started.elapsed()
    );

    assert_eq!(grading.await.expect("grading task"), StatusCode::OK);
}
