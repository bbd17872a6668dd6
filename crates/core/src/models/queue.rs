use std::fmt;

use serde::{Deserialize, Serialize};

/// 周期任务的任务ID，调度表与 worker 处理器共用
pub const HEARTBEAT_TASK: &str = "heartbeat";
pub const UPLOAD_FEEDBACK_DUMP_TASK: &str = "upload.feedback.dump";
pub const SEND_USAGE_EMAIL_TASK: &str = "send.usage.email";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    #[default]
    Direct,
    Topic,
    Fanout,
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeType::Direct => write!(f, "direct"),
            ExchangeType::Topic => write!(f, "topic"),
            ExchangeType::Fanout => write!(f, "fanout"),
        }
    }
}

/// 队列绑定：队列名 → 交换机 + 路由键
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueBinding {
    pub name: String,
    pub exchange: String,
    #[serde(default)]
    pub exchange_type: ExchangeType,
    pub routing_key: String,
    #[serde(default = "default_durable")]
    pub durable: bool,
}

fn default_durable() -> bool {
    true
}

impl QueueBinding {
    /// 交换机与路由键都使用队列名的直连绑定
    pub fn direct<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        Self {
            exchange: name.clone(),
            routing_key: name.clone(),
            name,
            exchange_type: ExchangeType::Direct,
            durable: true,
        }
    }

    pub fn new<N, E, R>(name: N, exchange: E, routing_key: R, durable: bool) -> Self
    where
        N: Into<String>,
        E: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            exchange: exchange.into(),
            exchange_type: ExchangeType::Direct,
            routing_key: routing_key.into(),
            durable,
        }
    }

    pub fn with_exchange_type(mut self, exchange_type: ExchangeType) -> Self {
        self.exchange_type = exchange_type;
        self
    }
}
