use async_trait::async_trait;
use serde_json::Value;

use crate::{models::InferenceBackend, OrchestratorResult};

/// 把一次推理请求发送到后端并返回其 JSON 响应
///
/// 失败时返回带错误码的 `OrchestratorError::Gateway`。
#[async_trait]
pub trait InferenceDispatcher: Send + Sync {
    async fn dispatch(&self, request: Value, backend: &InferenceBackend)
        -> OrchestratorResult<Value>;
}
