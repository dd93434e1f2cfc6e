use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use scribe_core::{AnswerGenerator, Error, PipelineFactory, Result, Turn};
use scribe_server::{create_router, AppState};
use tower::ServiceExt;

/// Answers every question and records the history it was given.
#[derive(Default)]
struct RecordingGenerator {
    histories: Mutex<Vec<Vec<Turn>>>,
    fail: AtomicBool,
}

impl RecordingGenerator {
    fn histories(&self) -> Vec<Vec<Turn>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        self.histories.lock().unwrap().push(history.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::LLMProvider("model returned 500".to_string()));
        }
        Ok(format!("answer to {}", question))
    }
}

/// Counts builds and fails the first `failures` of them.
struct FakeFactory {
    generator: Arc<RecordingGenerator>,
    builds: AtomicUsize,
    failures: AtomicUsize,
    delay: Duration,
}

impl FakeFactory {
    fn new(generator: Arc<RecordingGenerator>) -> Self {
        Self {
            generator,
            builds: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineFactory for FakeFactory {
    async fn build(&self) -> Result<Arc<dyn AnswerGenerator>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Configuration("GOOGLE_API_KEY is not set".to_string()));
        }

        let generator: Arc<dyn AnswerGenerator> = self.generator.clone();
        Ok(generator)
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    factory: Arc<FakeFactory>,
    generator: Arc<RecordingGenerator>,
}

fn test_app_with(configure: impl FnOnce(&mut FakeFactory)) -> TestApp {
    let generator = Arc::new(RecordingGenerator::default());
    let mut factory = FakeFactory::new(generator.clone());
    configure(&mut factory);
    let factory = Arc::new(factory);

    let state = AppState::new(factory.clone());
    TestApp {
        router: create_router(state.clone()),
        state,
        factory,
        generator,
    }
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

fn chat_request(body: &str) -> Request<Body> {
    Request::post("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_liveness() {
    let app = test_app();
    let resp = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    assert_eq!(&body[..], b"Backend server is running!");
    assert_eq!(app.factory.builds(), 0);
}

#[tokio::test]
async fn test_empty_question_is_rejected_without_initializing() {
    let app = test_app();

    let (status, json) = send(&app.router, chat_request(r#"{"question": ""}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, serde_json::json!({"error": "No question provided"}));
    assert_eq!(app.factory.builds(), 0);
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn test_missing_question_is_rejected() {
    let app = test_app();

    let bodies = [
        r#"{"session_id": "A"}"#,
        r#"{"question": null}"#,
        r#"{"question": 7}"#,
        r#"["What was discussed?", "A"]"#,
        "not json",
        "",
    ];
    for body in bodies {
        let (status, json) = send(&app.router, chat_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(json["error"], "No question provided");
    }

    assert!(app.state.sessions.is_empty());
    assert!(app.generator.histories().is_empty());
    assert_eq!(app.factory.builds(), 0);
}

#[tokio::test]
async fn test_default_session_accumulates_history() {
    let app = test_app();

    let (status, json) = send(&app.router, chat_request(r#"{"question": "What is the diagnosis?"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "answer to What is the diagnosis?");

    let (status, _) = send(&app.router, chat_request(r#"{"question": "And the treatment?"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let histories = app.generator.histories();
    assert!(histories[0].is_empty());
    assert_eq!(
        histories[1],
        vec![Turn::new("What is the diagnosis?", "answer to What is the diagnosis?")]
    );
    assert_eq!(app.state.sessions.get_history("default_session").len(), 2);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = test_app();

    send(&app.router, chat_request(r#"{"question": "q1", "session_id": "A"}"#)).await;
    send(&app.router, chat_request(r#"{"question": "q2", "session_id": "B"}"#)).await;

    let histories = app.generator.histories();
    assert!(histories[1].is_empty());
    assert_eq!(app.state.sessions.get_history("A"), vec![Turn::new("q1", "answer to q1")]);
    assert_eq!(app.state.sessions.get_history("B"), vec![Turn::new("q2", "answer to q2")]);
}

#[tokio::test]
async fn test_history_keeps_last_five_turns() {
    let app = test_app();

    for n in 0..7 {
        let body = format!(r#"{{"question": "q{}", "session_id": "long"}}"#, n);
        let (status, _) = send(&app.router, chat_request(&body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let histories = app.generator.histories();
    assert_eq!(histories[6].len(), 5);
    assert_eq!(histories[6][0].question, "q1");

    let questions: Vec<String> = app
        .state
        .sessions
        .get_history("long")
        .into_iter()
        .map(|t| t.question)
        .collect();
    assert_eq!(questions, vec!["q2", "q3", "q4", "q5", "q6"]);
}

#[tokio::test]
async fn test_generation_failure_is_500_and_leaves_history_alone() {
    let app = test_app();
    send(&app.router, chat_request(r#"{"question": "first", "session_id": "s"}"#)).await;

    app.generator.fail.store(true, Ordering::SeqCst);
    let (status, json) = send(&app.router, chat_request(r#"{"question": "second", "session_id": "s"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, serde_json::json!({"error": "Failed to process the request"}));
    assert_eq!(app.state.sessions.get_history("s"), vec![Turn::new("first", "answer to first")]);
}

#[tokio::test]
async fn test_initialization_failure_is_503_then_retried() {
    let app = test_app_with(|factory| {
        factory.failures = AtomicUsize::new(1);
    });

    let (status, json) = send(&app.router, chat_request(r#"{"question": "hello"}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json, serde_json::json!({"error": "Server is not ready, initialization failed."}));
    assert!(!app.state.pipeline.is_ready());
    assert!(app.state.sessions.is_empty());

    let (status, json) = send(&app.router, chat_request(r#"{"question": "hello"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "answer to hello");
    assert_eq!(app.factory.builds(), 2);
    assert!(app.state.pipeline.is_ready());
}

#[tokio::test]
async fn test_initialization_runs_once_across_requests() {
    let app = test_app();

    for _ in 0..4 {
        let (status, _) = send(&app.router, chat_request(r#"{"question": "again"}"#)).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.factory.builds(), 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_share_one_initialization() {
    let app = test_app_with(|factory| {
        factory.delay = Duration::from_millis(50);
    });

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..6 {
        let router = app.router.clone();
        let body = format!(r#"{{"question": "q{}", "session_id": "s{}"}}"#, n, n);
        tasks.spawn(async move { router.oneshot(chat_request(&body)).await.unwrap().status() });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(app.factory.builds(), 1);
    assert_eq!(app.state.sessions.len(), 6);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app();
    let resp = app
        .router
        .clone()
        .oneshot(Request::get("/api/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
