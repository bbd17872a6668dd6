use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use orchestrator_dispatcher::BeatScheduler;
use orchestrator_domain::PipelineManager;

use crate::handlers::{
    health::health_check,
    pipelines::{create_pipeline, get_pipeline, list_pipelines, run_pipeline},
    tasks::{list_tasks, register_task},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PipelineManager>,
    /// 带 `schedule` 的任务注册时登记到这里；未运行 beat 时为空
    pub beat: Option<Arc<BeatScheduler>>,
}

impl AppState {
    pub fn new(manager: Arc<PipelineManager>) -> Self {
        Self {
            manager,
            beat: None,
        }
    }

    pub fn with_beat(mut self, beat: Arc<BeatScheduler>) -> Self {
        self.beat = Some(beat);
        self
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    bounded_routes().merge(pipeline_run_routes()).with_state(state)
}

/// 受整体请求超时约束的路由
pub(crate) fn bounded_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/tasks", get(list_tasks).post(register_task))
        .route("/pipelines", get(list_pipelines).post(create_pipeline))
        .route("/pipelines/{id}", get(get_pipeline))
}

/// 流水线执行只受每一步后端调用的超时约束，不套整体请求超时
pub(crate) fn pipeline_run_routes() -> Router<AppState> {
    Router::new().route("/pipelines/{id}/run", post(run_pipeline))
}
