//! # 后台任务工作池
//!
//! 从消息代理消费周期任务，按任务ID分发给处理器。

pub mod handler;
pub mod handlers;
pub mod pool;

pub use handler::{HandlerRegistry, JobHandler};
pub use handlers::{LoggingNotifier, UsageNotifier, UsageSummary};
pub use pool::WorkerPool;
