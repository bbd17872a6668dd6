use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{InferenceBackend, ScheduleSpec};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 任务类别，决定步骤输出如何解码以及如何衔接下一步
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Asr,
    Translation,
    Transliteration,
    Tts,
    Generic,
}

impl TaskKind {
    /// 根据任务ID推断类别，无法识别时返回 `Generic`
    pub fn infer(task_id: &str) -> Self {
        task_id.parse().unwrap_or(TaskKind::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Asr => "asr",
            TaskKind::Translation => "translation",
            TaskKind::Transliteration => "transliteration",
            TaskKind::Tts => "tts",
            TaskKind::Generic => "generic",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asr" => Ok(TaskKind::Asr),
            "nmt" | "translation" => Ok(TaskKind::Translation),
            "transliteration" | "xlit" => Ok(TaskKind::Transliteration),
            "tts" => Ok(TaskKind::Tts),
            "generic" => Ok(TaskKind::Generic),
            other => Err(OrchestratorError::validation(format!(
                "未知的任务类别: {other}"
            ))),
        }
    }
}

/// 任务配置信封
///
/// 已知字段单独建模，其余字段原样保存在 `extra` 中。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskKind>,
    /// 显式指定的投递队列，优先于路由表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<InferenceBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskConfig {
    pub fn with_backend(backend: InferenceBackend) -> Self {
        Self {
            backend: Some(backend),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// 从任意 JSON 解析，格式错误时返回验证错误
    pub fn from_value(value: Value) -> OrchestratorResult<Self> {
        if !value.is_object() {
            return Err(OrchestratorError::validation("task_config 必须是JSON对象"));
        }
        let config: TaskConfig = serde_json::from_value(value)
            .map_err(|e| OrchestratorError::validation(format!("task_config 格式错误: {e}")))?;
        if let Some(schedule) = &config.schedule {
            schedule.validate()?;
        }
        if let Some(backend) = &config.backend {
            if backend.address.trim().is_empty() {
                return Err(OrchestratorError::validation("backend.address 不能为空"));
            }
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    pub id: String,
    pub config: TaskConfig,
    pub registered_at: DateTime<Utc>,
}

impl TaskDefinition {
    pub fn new<S: Into<String>>(id: S, config: TaskConfig) -> Self {
        Self {
            id: id.into(),
            config,
            registered_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.config.kind.unwrap_or_else(|| TaskKind::infer(&self.id))
    }

    pub fn backend(&self) -> Option<&InferenceBackend> {
        self.config.backend.as_ref()
    }
}
