use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 周期调度（beat）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    pub enabled: bool,
    /// 逻辑时钟的推进粒度
    pub tick_interval_ms: u64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 1000,
        }
    }
}

impl ConfigValidator for BeatConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_ms(self.tick_interval_ms, "beat.tick_interval_ms")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// 为空时使用主机名
    pub worker_id: Option<String>,
    /// 并发槽位数，每个槽位同一时刻只处理一个任务（prefetch = 1）
    pub concurrency: usize,
    /// 监听的队列，按轮询顺序消费
    pub queues: Vec<String>,
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_id: None,
            concurrency: 4,
            queues: vec![
                "heartbeat".to_string(),
                "upload-feedback-dump".to_string(),
                "send-usage-email".to_string(),
                "data-log".to_string(),
                "metrics-log".to_string(),
            ],
            poll_interval_ms: 500,
        }
    }
}

impl WorkerConfig {
    pub fn resolved_worker_id(&self) -> String {
        self.worker_id.clone().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .map(|name| format!("worker@{name}"))
                .unwrap_or_else(|| "worker@localhost".to_string())
        })
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if let Some(worker_id) = &self.worker_id {
            ValidationUtils::validate_not_empty(worker_id, "worker.worker_id")?;
        }
        ValidationUtils::validate_count(self.concurrency, "worker.concurrency", 256)?;
        ValidationUtils::validate_interval_ms(self.poll_interval_ms, "worker.poll_interval_ms")?;

        if self.queues.is_empty() {
            return Err(crate::ConfigError::Validation(
                "worker.queues cannot be empty".to_string(),
            ));
        }
        for queue in &self.queues {
            ValidationUtils::validate_not_empty(queue, "worker.queues")?;
        }

        Ok(())
    }
}
