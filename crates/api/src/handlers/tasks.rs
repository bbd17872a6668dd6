use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use orchestrator_core::TaskConfig;

use crate::{error::ApiResult, routes::AppState};

/// 任务注册请求
#[derive(Debug, Deserialize)]
pub struct RegisterTaskRequest {
    pub task_id: String,
    pub task_config: Value,
}

/// 注册或覆盖任务；带 `schedule` 的任务同时登记为周期任务
pub async fn register_task(
    State(state): State<AppState>,
    payload: Result<Json<RegisterTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let config = TaskConfig::from_value(request.task_config)?;

    if let Some(schedule) = &config.schedule {
        match &state.beat {
            Some(beat) => {
                beat.schedule_with(
                    &request.task_id,
                    schedule.clone(),
                    config.queue.clone(),
                    json!({}),
                )
                .await?;
                info!(task_id = %request.task_id, "任务已登记为周期任务");
            }
            None => warn!(
                task_id = %request.task_id,
                "当前进程未运行周期调度，忽略任务的 schedule 配置"
            ),
        }
    }

    let task = state
        .manager
        .register_task(&request.task_id, config)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "task_id": task.id,
    })))
}

/// 已注册的任务ID列表
pub async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    let task_ids: Vec<String> = state
        .manager
        .list_tasks()
        .await
        .into_iter()
        .map(|task| task.id)
        .collect();

    Json(json!({ "tasks": task_ids }))
}
