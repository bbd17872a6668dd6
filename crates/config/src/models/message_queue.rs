use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 消息代理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 未配置路由的任务进入的默认队列
    pub default_queue: String,
    /// 单个内存队列的最大消息数（0表示无限制）
    pub max_queue_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_queue: "default".to_string(),
            max_queue_size: 10_000,
        }
    }
}

impl ConfigValidator for BrokerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.default_queue, "broker.default_queue")?;
        Ok(())
    }
}
