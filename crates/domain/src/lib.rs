//! # 流水线管理
//!
//! 任务与流水线的注册表，以及按步骤顺序执行推理流水线的 `PipelineManager`。
//!
//! 注册表是一个显式的状态容器，通过 `Arc` 在 API、调度器和 worker 之间共享，
//! 所有修改都在同一把 `tokio::sync::RwLock` 之后串行化。

pub mod pipeline_manager;
pub mod registry;

pub use pipeline_manager::PipelineManager;
pub use registry::Registry;
