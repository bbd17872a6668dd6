use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 推理网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 进程级开关：开启后所有 TENSOR_RPC 调用都发往 `shared_tensor_endpoint`，忽略任务自身的配置
    pub use_shared_tensor_endpoint: bool,
    pub shared_tensor_endpoint: String,
    /// 就绪探测的最长等待时间，超时按探测失败记录
    pub probe_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            use_shared_tensor_endpoint: false,
            shared_tensor_endpoint: "http://localhost:8000".to_string(),
            probe_timeout_ms: 5000,
        }
    }
}

impl GatewayConfig {
    /// 生效的共享地址，未开启开关时为 None
    pub fn tensor_override(&self) -> Option<&str> {
        self.use_shared_tensor_endpoint
            .then_some(self.shared_tensor_endpoint.as_str())
    }
}

impl ConfigValidator for GatewayConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.use_shared_tensor_endpoint {
            ValidationUtils::validate_url(
                &self.shared_tensor_endpoint,
                "gateway.shared_tensor_endpoint",
            )?;
        }
        ValidationUtils::validate_interval_ms(self.probe_timeout_ms, "gateway.probe_timeout_ms")?;
        Ok(())
    }
}
