use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use orchestrator_core::CodedError;

pub mod codec;
pub mod kserve;

pub use codec::{InferRequest, InferResponse, InferTensor, RequestedOutput};
pub use kserve::{KServeClient, KServeClientFactory};

/// 面向张量的推理客户端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TensorClient: Send + Sync {
    /// 就绪探测，结果仅供参考
    async fn is_server_ready(&self) -> Result<bool, CodedError>;

    async fn infer(
        &self,
        model_name: &str,
        model_version: &str,
        request: InferRequest,
        headers: &BTreeMap<String, String>,
    ) -> Result<InferResponse, CodedError>;
}

/// 按地址创建张量客户端
pub trait TensorClientFactory: Send + Sync {
    fn create(&self, address: &str) -> Result<Arc<dyn TensorClient>, CodedError>;
}
