//! # Orchestrator API
//!
//! 流水线编排的 REST 接口，基于 Axum 构建。
//!
//! ## API 端点
//!
//! - `POST /tasks` 注册或覆盖任务，`GET /tasks` 列出已注册任务
//! - `POST /pipelines` 创建流水线，`GET /pipelines` 列出流水线
//! - `GET /pipelines/{id}` 获取流水线定义
//! - `POST /pipelines/{id}/run` 同步执行流水线
//! - `GET /health` 健康检查
//!
//! ## 错误响应
//!
//! ```json
//! {
//!   "error": {
//!     "code": "GATEWAY-103",
//!     "message": "流水线第 1 步 (nmt) 执行失败: ...",
//!     "trace": "...",
//!     "step_index": 1,
//!     "task_type": "nmt"
//!   },
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! 验证失败、重复的流水线ID和未注册的任务类型返回 400，未知流水线返回 404，
//! 后端超时返回 504，其他后端错误返回 502。
//!
//! `request_timeout_seconds` 约束除 `POST /pipelines/{id}/run` 以外的所有请求；
//! 流水线执行只受每一步后端调用自身的超时约束。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, request_timeout, trace_layer};
use orchestrator_config::ApiConfig;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let timeout = Duration::from_secs(config.request_timeout_seconds);
    let router = routes::bounded_routes()
        .layer(axum::middleware::from_fn_with_state(timeout, request_timeout))
        .merge(routes::pipeline_run_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer())
                .layer(axum::middleware::from_fn(request_logging)),
        );

    if config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
