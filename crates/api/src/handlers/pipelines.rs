use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use orchestrator_core::{PipelineRunResult, TaskStep};

use crate::{error::ApiResult, routes::AppState};

/// 流水线创建请求
#[derive(Debug, Deserialize)]
pub struct CreatePipelineRequest {
    pub pipeline_id: String,
    pub task_sequence: Vec<TaskStep>,
}

/// 流水线执行请求
#[derive(Debug, Deserialize)]
pub struct RunPipelineRequest {
    #[serde(default)]
    pub input: Value,
}

pub async fn create_pipeline(
    State(state): State<AppState>,
    payload: Result<Json<CreatePipelineRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let pipeline = state
        .manager
        .create_pipeline(&request.pipeline_id, request.task_sequence)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "pipeline_id": pipeline.pipeline_id,
        })),
    ))
}

pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let pipeline = state.manager.get_pipeline(&id).await?;
    Ok(Json(json!({
        "pipeline_id": pipeline.pipeline_id,
        "task_sequence": pipeline.steps,
    })))
}

pub async fn list_pipelines(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "pipelines": state.manager.list_pipelines().await }))
}

/// 同步执行流水线，返回最后一步的输出
pub async fn run_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RunPipelineRequest>, JsonRejection>,
) -> ApiResult<Json<PipelineRunResult>> {
    let Json(request) = payload?;
    Ok(Json(state.manager.execute(&id, request.input).await?))
}
