//! # Orchestrator Core
//!
//! 编排层共享的数据模型与协作者接口：任务与流水线定义、队列绑定、调度规格、
//! 推理后端描述、后台任务调用，以及消息代理、文档存储、推理分发和时钟的抽象。

pub mod logging;
pub mod models;
pub mod traits;

pub use models::*;
pub use orchestrator_errors::{CodedError, ErrorCode, OrchestratorError, OrchestratorResult};
pub use traits::*;
