use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;
pub const DEFAULT_MODEL_VERSION: &str = "1";

/// 推理后端的协议类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// 通用 JSON over HTTP
    #[serde(rename = "GENERIC_HTTP")]
    GenericHttp,
    /// 面向张量的推理 RPC（KServe v2 / Triton 协议）
    #[serde(rename = "TENSOR_RPC")]
    TensorRpc,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::GenericHttp => write!(f, "GENERIC_HTTP"),
            ProtocolKind::TensorRpc => write!(f, "TENSOR_RPC"),
        }
    }
}

/// 推理后端描述
///
/// 每个任务携带自己的后端描述。`TENSOR_RPC` 后端的地址可能被进程级的共享地址覆盖，
/// 见 `GatewayConfig::use_shared_tensor_endpoint`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceBackend {
    pub protocol: ProtocolKind,
    pub address: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 单个客户端同时在途的调用上限，超出的调用在本地排队
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// 输入张量名；为空时整个请求作为一个 `INPUT_JSON` 张量发送
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_model_version() -> String {
    DEFAULT_MODEL_VERSION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl InferenceBackend {
    pub fn generic_http<S: Into<String>>(address: S) -> Self {
        Self {
            protocol: ProtocolKind::GenericHttp,
            address: address.into(),
            model_name: String::new(),
            model_version: default_model_version(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            inputs: Vec::new(),
            outputs: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn tensor_rpc<A: Into<String>, M: Into<String>>(address: A, model_name: M) -> Self {
        Self {
            protocol: ProtocolKind::TensorRpc,
            model_name: model_name.into(),
            ..Self::generic_http(address)
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
