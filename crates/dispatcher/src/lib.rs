//! # 队列路由与周期调度
//!
//! `QueueRouter` 把任务ID映射到具名队列并负责投递；`BeatScheduler` 在单一逻辑时钟上
//! 按固定间隔或类 crontab 规则触发周期任务，每个到期条目每个 tick 只投递一次。

pub mod beat;
pub mod cron_utils;
pub mod router;

pub use beat::{default_beat_schedule, BeatEntry, BeatScheduler};
pub use cron_utils::CronScheduler;
pub use router::QueueRouter;
