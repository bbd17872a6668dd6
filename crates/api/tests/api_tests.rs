use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use orchestrator_api::{create_app, AppState};
use orchestrator_config::ApiConfig;
use orchestrator_core::{
    CodedError, InferenceBackend, InferenceDispatcher, ManualClock, OrchestratorResult,
};
use orchestrator_dispatcher::{BeatScheduler, QueueRouter};
use orchestrator_domain::{PipelineManager, Registry};
use orchestrator_infrastructure::InMemoryMessageQueue;

/// 按后端地址返回预设响应
#[derive(Default)]
struct ScriptedDispatcher {
    responses: Mutex<HashMap<String, Result<Value, CodedError>>>,
}

impl ScriptedDispatcher {
    fn respond(&self, address: &str, response: Result<Value, CodedError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(address.to_string(), response);
    }
}

#[async_trait]
impl InferenceDispatcher for ScriptedDispatcher {
    async fn dispatch(
        &self,
        request: Value,
        backend: &InferenceBackend,
    ) -> OrchestratorResult<Value> {
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get(&backend.address)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "echo": request })));
        Ok(scripted?)
    }
}

fn test_app() -> (Router, Arc<ScriptedDispatcher>) {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let manager = Arc::new(PipelineManager::new(
        Arc::new(Registry::new()),
        dispatcher.clone(),
    ));
    (create_app(AppState::new(manager), &ApiConfig::default()), dispatcher)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register(app: &Router, task_id: &str, address: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/tasks",
        Some(json!({
            "task_id": task_id,
            "task_config": {
                "backend": {"protocol": "GENERIC_HTTP", "address": address}
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_pipeline_create_and_get() {
    let (app, _) = test_app();
    register(&app, "echo.task", "http://echo").await;

    let (status, body) = send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({
            "pipeline_id": "echo-pipeline",
            "task_sequence": [{"taskType": "echo.task", "config": {"serviceId": "echo-v1"}}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"status": "success", "pipeline_id": "echo-pipeline"}));

    let (status, body) = send(&app, "GET", "/pipelines/echo-pipeline", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pipeline_id"], "echo-pipeline");
    assert_eq!(body["task_sequence"][0]["taskType"], "echo.task");
    assert_eq!(body["task_sequence"][0]["config"]["serviceId"], "echo-v1");
    assert_eq!(body.as_object().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/pipelines", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pipelines"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "GET", "/pipelines/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PIPELINE_NOT_FOUND");
}

#[tokio::test]
async fn test_pipeline_creation_rejections_are_400() {
    let (app, _) = test_app();
    register(&app, "echo.task", "http://echo").await;

    let pipeline = json!({
        "pipeline_id": "p1",
        "task_sequence": [{"taskType": "echo.task"}]
    });
    let (status, _) = send(&app, "POST", "/pipelines", Some(pipeline.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/pipelines", Some(pipeline)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_PIPELINE");

    let (status, body) = send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({"pipeline_id": "p2", "task_sequence": [{"taskType": "unregistered"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({"pipeline_id": "p3", "task_sequence": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/pipelines", Some(json!({"task_sequence": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_task_registration_and_listing() {
    let (app, _) = test_app();
    register(&app, "nmt", "http://nmt-a").await;
    register(&app, "asr", "http://asr").await;
    register(&app, "nmt", "http://nmt-b").await;

    let (status, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tasks": ["asr", "nmt"]}));

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({"task_id": "bad", "task_config": "not-an-object"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_pipeline_returns_output() {
    let (app, dispatcher) = test_app();
    register(&app, "echo.task", "http://echo").await;
    dispatcher.respond("http://echo", Ok(json!({"output": [{"target": "नमस्ते"}]})));

    send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({"pipeline_id": "p", "task_sequence": [{"taskType": "echo.task"}]})),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/pipelines/p/run",
        Some(json!({"input": {"input": [{"source": "hello"}]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pipeline_id"], "p");
    assert_eq!(body["output"]["output"][0]["target"], "नमस्ते");
    assert_eq!(body["steps_executed"], 1);

    let (status, _) = send(&app, "POST", "/pipelines/missing/run", Some(json!({"input": {}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_backend_failures_map_to_gateway_statuses() {
    let (app, dispatcher) = test_app();
    register(&app, "first.task", "http://first").await;
    register(&app, "second.task", "http://second").await;

    send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({
            "pipeline_id": "two-step",
            "task_sequence": [{"taskType": "first.task"}, {"taskType": "second.task"}]
        })),
    )
    .await;

    dispatcher.respond("http://second", Err(CodedError::timeout("nmt took too long")));
    let (status, body) = send(&app, "POST", "/pipelines/two-step/run", Some(json!({"input": {}}))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "GATEWAY-103");
    assert_eq!(body["error"]["step_index"], 1);
    assert_eq!(body["error"]["task_type"], "second.task");

    dispatcher.respond(
        "http://first",
        Err(CodedError::upstream("HTTP 500").with_trace("internal server error")),
    );
    let (status, body) = send(&app, "POST", "/pipelines/two-step/run", Some(json!({"input": {}}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "GATEWAY-102");
    assert_eq!(body["error"]["step_index"], 0);
    assert_eq!(body["error"]["trace"], "internal server error");
}

#[tokio::test]
async fn test_scheduled_task_is_registered_with_beat() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let manager = Arc::new(PipelineManager::new(Arc::new(Registry::new()), dispatcher));
    let router = Arc::new(QueueRouter::default_topology("default").unwrap());
    let beat = Arc::new(BeatScheduler::new(
        router,
        Arc::new(InMemoryMessageQueue::new()),
        Arc::new(ManualClock::new(chrono::Utc::now())),
    ));
    let app = create_app(
        AppState::new(manager).with_beat(beat.clone()),
        &ApiConfig::default(),
    );

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({
            "task_id": "push.metrics",
            "task_config": {
                "queue": "metrics-log",
                "schedule": {"type": "interval", "seconds": 60}
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = beat.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].task_id, "push.metrics");
    assert_eq!(entries[0].queue.as_deref(), Some("metrics-log"));

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({
            "task_id": "bad.queue",
            "task_config": {
                "queue": "not-bound",
                "schedule": {"type": "interval", "seconds": 60}
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_schedule_interval_is_rejected() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let manager = Arc::new(PipelineManager::new(Arc::new(Registry::new()), dispatcher));
    let router = Arc::new(QueueRouter::default_topology("default").unwrap());
    let beat = Arc::new(BeatScheduler::new(
        router,
        Arc::new(InMemoryMessageQueue::new()),
        Arc::new(ManualClock::new(chrono::Utc::now())),
    ));
    let app = create_app(
        AppState::new(manager).with_beat(beat.clone()),
        &ApiConfig::default(),
    );

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({
            "task_id": "too.far",
            "task_config": {"schedule": {"type": "interval", "seconds": 100_000_000_000_000u64}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(beat.entries().await.is_empty());

    let (_, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(body, json!({"tasks": []}));
}

/// 每次调用都要等待一段时间的后端
struct SlowDispatcher {
    delay: Duration,
}

#[async_trait]
impl InferenceDispatcher for SlowDispatcher {
    async fn dispatch(
        &self,
        request: Value,
        _backend: &InferenceBackend,
    ) -> OrchestratorResult<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(request)
    }
}

#[tokio::test]
async fn test_pipeline_run_outlasts_request_timeout() {
    let manager = Arc::new(PipelineManager::new(
        Arc::new(Registry::new()),
        Arc::new(SlowDispatcher {
            delay: Duration::from_millis(700),
        }),
    ));
    let config = ApiConfig {
        request_timeout_seconds: 1,
        ..ApiConfig::default()
    };
    let app = create_app(AppState::new(manager), &config);

    register(&app, "first.task", "http://first").await;
    register(&app, "second.task", "http://second").await;
    let (status, _) = send(
        &app,
        "POST",
        "/pipelines",
        Some(json!({
            "pipeline_id": "slow",
            "task_sequence": [{"taskType": "first.task"}, {"taskType": "second.task"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // 两步合计约 1.4 秒，超过 1 秒的请求超时
    let (status, body) = send(
        &app,
        "POST",
        "/pipelines/slow/run",
        Some(json!({"input": {"input": [{"source": "hello"}]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["steps_executed"], 2);
}
