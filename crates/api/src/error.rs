use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orchestrator_core::{ErrorCode, OrchestratorError};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("请求处理超时")]
    RequestTimeout,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Orchestrator(e) => match e.root() {
                OrchestratorError::PipelineNotFound { .. } => StatusCode::NOT_FOUND,
                OrchestratorError::Gateway(coded) if coded.code == ErrorCode::Timeout => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                OrchestratorError::Gateway(_) => StatusCode::BAD_GATEWAY,
                _ if e.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 错误码：后端错误使用 GATEWAY-xxx，其余使用错误类别名
    pub fn code(&self) -> String {
        let kind = match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::RequestTimeout => "REQUEST_TIMEOUT",
            ApiError::Orchestrator(e) => match e.root() {
                OrchestratorError::Gateway(coded) => return coded.code.to_string(),
                OrchestratorError::Validation(_) => "VALIDATION_ERROR",
                OrchestratorError::DuplicatePipeline { .. } => "DUPLICATE_PIPELINE",
                OrchestratorError::TaskNotFound { .. } => "TASK_NOT_FOUND",
                OrchestratorError::PipelineNotFound { .. } => "PIPELINE_NOT_FOUND",
                _ => "INTERNAL_ERROR",
            },
        };
        kind.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (step_index, task_type, trace) = match &self {
            ApiError::Orchestrator(e) => {
                let (step_index, task_type) = match e {
                    OrchestratorError::StepFailed {
                        step_index,
                        task_type,
                        ..
                    } => (Some(*step_index), Some(task_type.clone())),
                    _ => (None, None),
                };
                let trace = e.coded().map(|c| c.trace.clone()).unwrap_or_default();
                (step_index, task_type, trace)
            }
            _ => (None, None, String::new()),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), code = %code, error = %self, "请求处理失败");
        } else {
            warn!(status = status.as_u16(), code = %code, error = %self, "请求被拒绝");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "trace": trace,
                "step_index": step_index,
                "task_type": task_type,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
