use serde_json::Value;
use tracing::debug;

use orchestrator_core::{CodedError, ErrorCode, InferenceBackend};

/// 诊断信息中保留的响应体最大长度
const MAX_TRACE_BODY: usize = 2048;

/// 通用 JSON over HTTP 适配器
pub struct HttpAdapter {
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST 请求体到 `backend.address`，返回解析后的 JSON 响应
    pub async fn call(
        &self,
        request: &Value,
        backend: &InferenceBackend,
    ) -> Result<Value, CodedError> {
        let address = backend.address.as_str();
        debug!(address, timeout_ms = backend.timeout_ms, "发送HTTP推理请求");

        let mut request_builder = self
            .client
            .post(address)
            .json(request)
            .timeout(backend.timeout());
        for (key, value) in &backend.headers {
            request_builder = request_builder.header(key, value);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| transport_error(&e, address))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                CodedError::upstream(format!("后端返回 HTTP {status}: {address}"))
                    .with_trace(truncate(&body, MAX_TRACE_BODY)),
            );
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                CodedError::capture(ErrorCode::Timeout, format!("读取响应超时: {address}"), &e)
            } else {
                CodedError::capture(
                    ErrorCode::Upstream,
                    format!("后端响应不是合法JSON: {address}"),
                    &e,
                )
            }
        })
    }
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// 传输层失败分类：超时归为 GATEWAY-103，其余归为 GATEWAY-101
pub(crate) fn transport_error(e: &reqwest::Error, address: &str) -> CodedError {
    if e.is_timeout() {
        CodedError::capture(ErrorCode::Timeout, format!("调用超时: {address}"), e)
    } else {
        CodedError::capture(ErrorCode::Connection, format!("无法连接后端: {address}"), e)
    }
}

pub(crate) fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
