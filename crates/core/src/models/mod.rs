//! # 数据模型
//!
//! 编排层的核心数据结构：任务与流水线定义、队列绑定、调度规格、推理后端描述、
//! 后台任务调用以及步骤输出。
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举类型避免无效状态。
//! 任务配置和步骤配置采用"已知字段 + 开放扩展字段"的信封结构，未知字段原样保留。
//!
//! ## 状态流转
//!
//! ```text
//! PENDING → RUNNING → SUCCEEDED
//!              ↓
//!            FAILED
//! ```

pub mod backend;
pub mod inference;
pub mod job;
pub mod pipeline;
pub mod queue;
pub mod schedule;
pub mod task;

pub use backend::*;
pub use inference::*;
pub use job::*;
pub use pipeline::*;
pub use queue::*;
pub use schedule::*;
pub use task::*;
