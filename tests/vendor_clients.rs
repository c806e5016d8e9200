// Vendor clients against local fake servers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use content_studio::apify_client::{normalize_item, scraper_input, ApifyClient};
use content_studio::error::VendorError;
use content_studio::fal_client::{self, FalClient, FalModels};
use content_studio::jobs::poller::{poll_until_terminal, PollOutcome, PollPolicy, Provider, RemoteJobState};
use content_studio::jobs::sink::KeywordMatcher;
use content_studio::jobs::{Job, JobKind, JobManager, JobSink, JobStatus, JobTarget, NewJob};
use content_studio::replicate_client::{self, ReplicateClient, ReplicateModels};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 20,
        max_consecutive_errors: 2,
    }
}

#[derive(Clone, Default)]
struct Calls {
    status_checks: Arc<AtomicU32>,
}

// ============================================================================
// Fal.ai queue
// ============================================================================

async fn fal_submit(headers: HeaderMap, Json(input): Json<Value>) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Key test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    assert_eq!(input["prompt"], "latte art");
    Json(json!({ "request_id": "req-1" })).into_response()
}

async fn fal_status(State(calls): State<Calls>) -> Json<Value> {
    let n = calls.status_checks.fetch_add(1, Ordering::SeqCst);
    Json(match n {
        0 => json!({ "status": "IN_QUEUE", "queue_position": 2 }),
        1 => json!({ "status": "IN_PROGRESS" }),
        _ => json!({ "status": "COMPLETED" }),
    })
}

async fn fal_result() -> Json<Value> {
    Json(json!({ "images": [{ "url": "https://cdn.example.com/latte.png" }] }))
}

fn fal_app(calls: Calls) -> Router {
    let model = FalModels::IMAGE;
    Router::new()
        .route(&format!("/{}", model), post(fal_submit))
        .route(&format!("/{}/requests/req-1/status", model), get(fal_status))
        .route(&format!("/{}/requests/req-1", model), get(fal_result))
        .with_state(calls)
}

#[tokio::test]
async fn fal_job_is_polled_to_completion() {
    let calls = Calls::default();
    let base = spawn(fal_app(calls.clone())).await;
    let fal = FalClient::with_base_url("test-key".to_string(), base);

    let job = fal.submit(FalModels::IMAGE, &fal_client::image_input("latte art")).await.unwrap();
    assert_eq!(job.provider, Provider::Fal);
    assert_eq!(job.id, "req-1");
    assert!(job.status_url.as_deref().unwrap().ends_with("/requests/req-1/status"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let outcome = poll_until_terminal(&fal, &job, &fast_policy(), &CancellationToken::new(), |attempt, state| {
        let seen = seen.clone();
        let state = state.clone();
        async move {
            seen.lock().unwrap().push((attempt, state));
        }
    })
    .await;

    match outcome {
        PollOutcome::Completed { output_url, .. } => {
            assert_eq!(output_url.as_deref(), Some("https://cdn.example.com/latte.png"))
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (1, RemoteJobState::Pending { queue_position: Some(2) }),
            (2, RemoteJobState::Running { progress: None }),
        ]
    );
    assert_eq!(calls.status_checks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn fal_submission_is_not_repeated_after_gateway_error() {
    let calls = Calls::default();
    let seen = calls.clone();
    let app = Router::new().route(
        &format!("/{}", FalModels::IMAGE),
        post(move || {
            let seen = seen.clone();
            async move {
                seen.status_checks.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_GATEWAY, "upstream hiccup")
            }
        }),
    );
    let base = spawn(app).await;
    let fal = FalClient::with_base_url("test-key".to_string(), base);

    let err = fal
        .submit(FalModels::IMAGE, &fal_client::image_input("latte art"))
        .await
        .unwrap_err();
    assert!(matches!(err, VendorError::Api { status: 502, .. }), "{:?}", err);
    assert_eq!(calls.status_checks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fal_rejects_bad_key_without_retrying() {
    let base = spawn(fal_app(Calls::default())).await;
    let fal = FalClient::with_base_url("wrong".to_string(), base);

    let err = fal
        .submit(FalModels::IMAGE, &fal_client::image_input("latte art"))
        .await
        .unwrap_err();
    assert!(matches!(err, VendorError::Api { status: 401, .. }), "{:?}", err);
    assert!(!err.is_transient());
}

// ============================================================================
// Replicate predictions
// ============================================================================

async fn replicate_create(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer r8-token")
    );
    assert_eq!(body["input"]["prompt"], "espresso pour");
    Json(json!({ "id": "p1", "status": "starting" }))
}

async fn replicate_get(State(calls): State<Calls>) -> Response {
    let n = calls.status_checks.fetch_add(1, Ordering::SeqCst);
    match n {
        // One transient failure is retried inside the client
        0 => (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response(),
        1 => Json(json!({ "id": "p1", "status": "processing" })).into_response(),
        _ => Json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/p1/out.png"]
        }))
        .into_response(),
    }
}

#[tokio::test]
async fn replicate_prediction_survives_transient_error() {
    let calls = Calls::default();
    let app = Router::new()
        .route(
            &format!("/models/{}/predictions", ReplicateModels::IMAGE),
            post(replicate_create),
        )
        .route("/predictions/p1", get(replicate_get))
        .with_state(calls.clone());
    let base = spawn(app).await;
    let replicate = ReplicateClient::with_base_url("r8-token".to_string(), base);

    let job = replicate
        .create_prediction(ReplicateModels::IMAGE, replicate_client::image_input("espresso pour"))
        .await
        .unwrap();
    assert_eq!(job.id, "p1");

    let outcome = poll_until_terminal(&replicate, &job, &fast_policy(), &CancellationToken::new(), |_, _| async {}).await;
    assert!(matches!(
        outcome,
        PollOutcome::Completed { output_url: Some(ref url), .. } if url == "https://replicate.delivery/p1/out.png"
    ));
    assert_eq!(calls.status_checks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancelled_poll_stops_early() {
    let app = Router::new().route(
        "/predictions/p1",
        get(|| async { Json(json!({ "id": "p1", "status": "processing" })) }),
    );
    let base = spawn(app).await;
    let replicate = ReplicateClient::with_base_url("r8-token".to_string(), base);
    let job = content_studio::jobs::poller::ExternalJob::new(Provider::Replicate, "p1");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let policy = PollPolicy {
        interval: Duration::from_millis(50),
        max_attempts: 1000,
        max_consecutive_errors: 2,
    };

    let outcome = poll_until_terminal(&replicate, &job, &policy, &cancel, |attempt, _| {
        let trigger = trigger.clone();
        async move {
            if attempt == 2 {
                trigger.cancel();
            }
        }
    })
    .await;
    assert_eq!(outcome, PollOutcome::Cancelled);
}

// ============================================================================
// Apify listening scan
// ============================================================================

async fn apify_start(Json(input): Json<Value>) -> Json<Value> {
    assert_eq!(input["platform"], "twitter");
    Json(json!({ "data": { "id": "run-1", "status": "READY" } }))
}

async fn apify_run(State(calls): State<Calls>) -> Json<Value> {
    let n = calls.status_checks.fetch_add(1, Ordering::SeqCst);
    let status = if n == 0 { "RUNNING" } else { "SUCCEEDED" };
    Json(json!({ "data": { "id": "run-1", "status": status, "defaultDatasetId": "ds-1" } }))
}

async fn apify_items() -> Json<Value> {
    Json(json!([
        { "full_text": "Best cold brew in Austin", "user": { "screen_name": "bean_fan" }, "url": "https://x.com/1" },
        { "full_text": "Nothing to see here", "user": { "screen_name": "other" }, "url": "https://x.com/2" },
        { "author": "no text" }
    ]))
}

#[tokio::test]
async fn apify_scan_yields_matching_posts() {
    let actor = "apify~social-media-scraper";
    let app = Router::new()
        .route(&format!("/acts/{}/runs", actor), post(apify_start))
        .route("/actor-runs/run-1", get(apify_run))
        .route("/datasets/ds-1/items", get(apify_items))
        .with_state(Calls::default());
    let base = spawn(app).await;
    let apify = ApifyClient::with_base_url("apify-token".to_string(), base);

    let keywords = vec!["cold brew".to_string()];
    let job = apify
        .start_run(actor, &scraper_input("twitter", &keywords, 50))
        .await
        .unwrap();

    let outcome = poll_until_terminal(&apify, &job, &fast_policy(), &CancellationToken::new(), |_, _| async {}).await;
    let dataset_id = match &outcome {
        PollOutcome::Completed { payload, .. } => payload["defaultDatasetId"].as_str().unwrap().to_string(),
        other => panic!("unexpected outcome {:?}", other),
    };

    let items = apify.dataset_items(&dataset_id, 200).await.unwrap();
    assert_eq!(items.len(), 3);

    let matcher = KeywordMatcher::new(&keywords).unwrap();
    let hits: Vec<_> = items
        .iter()
        .filter_map(|item| normalize_item(item, "twitter"))
        .filter_map(|post| matcher.to_hit(post))
        .collect();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].author, "bean_fan");
    assert_eq!(hits[0].url.as_deref(), Some("https://x.com/1"));
    assert_eq!(hits[0].matched_keywords, vec!["cold brew"]);
}

// ============================================================================
// Vendors that never answer
// ============================================================================

/// Accepts connections and never writes a byte back
async fn spawn_silent() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

struct NoopSink;

#[async_trait::async_trait]
impl JobSink for NoopSink {
    async fn on_finished(&self, _job: &Job, _outcome: &PollOutcome) {}
}

#[tokio::test]
async fn cancel_stops_job_stuck_on_silent_vendor() {
    let base = spawn_silent().await;
    let fal = FalClient::with_base_url("test-key".to_string(), base.clone());
    let mut external = content_studio::jobs::poller::ExternalJob::new(Provider::Fal, "req-silent");
    external.status_url = Some(format!("{}/status", base));
    external.response_url = Some(base);

    let manager = Arc::new(JobManager::new());
    let new_job = || NewJob {
        user_id: 1,
        kind: JobKind::Image,
        external: external.clone(),
        target: JobTarget::None,
    };

    let first = manager
        .submit(new_job(), Arc::new(fal.clone()), fast_policy(), Arc::new(NoopSink))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.cancel(&first.job_id, 1).await.unwrap();

    let mut status = None;
    for _ in 0..100 {
        let job = manager.get(&first.job_id).await.unwrap();
        if job.status.is_terminal() {
            status = Some(job.status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, Some(JobStatus::Cancelled));

    let again = manager
        .submit(new_job(), Arc::new(fal), fast_policy(), Arc::new(NoopSink))
        .await;
    assert!(!again.deduplicated);
    manager.cancel(&again.job_id, 1).await.unwrap();
}
