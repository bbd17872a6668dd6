//! # 推理网关
//!
//! 把一次推理请求分发到 `GENERIC_HTTP` 或 `TENSOR_RPC` 后端。
//!
//! - 通用 HTTP：JSON POST 到后端地址，非成功状态码归为上游错误，传输失败归为连接错误
//! - 张量 RPC：按地址缓存客户端并限制并发，调用前做一次不阻塞的就绪探测，整个调用受超时约束
//!
//! 所有失败都以 `CodedError` 信封返回，不做任何重试。

pub mod gateway;
pub mod http_adapter;
pub mod tensor;

pub use gateway::InferenceGateway;
pub use http_adapter::HttpAdapter;
pub use tensor::{KServeClient, KServeClientFactory, TensorClient, TensorClientFactory};
