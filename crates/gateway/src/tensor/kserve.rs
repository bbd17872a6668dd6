use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::codec::{InferRequest, InferResponse};
use super::{TensorClient, TensorClientFactory};
use crate::http_adapter::{transport_error, truncate};
use orchestrator_core::{CodedError, ErrorCode};

/// 基于 KServe v2 HTTP/REST 协议的张量推理客户端（兼容 Triton）
pub struct KServeClient {
    base_url: String,
    http: reqwest::Client,
}

impl KServeClient {
    pub fn new(address: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: normalize_base_url(address),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn infer_url(&self, model_name: &str, model_version: &str) -> String {
        if model_version.is_empty() {
            format!("{}/v2/models/{}/infer", self.base_url, model_name)
        } else {
            format!(
                "{}/v2/models/{}/versions/{}/infer",
                self.base_url, model_name, model_version
            )
        }
    }
}

#[async_trait]
impl TensorClient for KServeClient {
    async fn is_server_ready(&self) -> Result<bool, CodedError> {
        let url = format!("{}/v2/health/ready", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&e, &self.base_url))?;
        Ok(response.status().is_success())
    }

    async fn infer(
        &self,
        model_name: &str,
        model_version: &str,
        request: InferRequest,
        headers: &BTreeMap<String, String>,
    ) -> Result<InferResponse, CodedError> {
        let url = self.infer_url(model_name, model_version);
        debug!(url = %url, inputs = request.inputs.len(), "发送张量推理请求");

        let mut request_builder = self.http.post(&url).json(&request);
        for (key, value) in headers {
            request_builder = request_builder.header(key, value);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| transport_error(&e, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                CodedError::upstream(format!("张量后端返回 HTTP {status}: {url}"))
                    .with_trace(truncate(&body, 2048)),
            );
        }

        response.json::<InferResponse>().await.map_err(|e| {
            CodedError::capture(ErrorCode::Upstream, format!("无法解析推理响应: {url}"), &e)
        })
    }
}

/// 为每个地址创建 `KServeClient`，所有客户端共享同一个连接池
#[derive(Default)]
pub struct KServeClientFactory {
    http: reqwest::Client,
}

impl KServeClientFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TensorClientFactory for KServeClientFactory {
    fn create(&self, address: &str) -> Result<Arc<dyn TensorClient>, CodedError> {
        if address.trim().is_empty() {
            return Err(CodedError::connection("张量后端地址为空"));
        }
        Ok(Arc::new(KServeClient::new(address, self.http.clone())))
    }
}

/// 去掉末尾的斜杠，缺少协议时补上 `http://`
fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
