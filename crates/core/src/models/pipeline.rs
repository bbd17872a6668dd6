use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 步骤级配置：已知的 `serviceId` / `domain` 加上开放的扩展字段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StepConfig {
    pub fn is_empty(&self) -> bool {
        self.service_id.is_none() && self.domain.is_none() && self.extra.is_empty()
    }

    /// 将步骤配置合并进请求的 `config` 对象，步骤配置覆盖同名字段。
    /// 非对象请求会被包装为 `{"input": <request>}`。
    pub fn apply_to(&self, request: Value) -> Value {
        let mut body = match request {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                map
            }
        };

        if self.is_empty() {
            return Value::Object(body);
        }

        let mut merged = match body.remove("config") {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        if let Ok(Value::Object(step)) = serde_json::to_value(self) {
            merged.extend(step);
        }
        body.insert("config".to_string(), Value::Object(merged));
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStep {
    #[serde(rename = "taskType")]
    pub task_type: String,
    #[serde(default)]
    pub config: StepConfig,
}

impl TaskStep {
    pub fn new<S: Into<String>>(task_type: S) -> Self {
        Self {
            task_type: task_type.into(),
            config: StepConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }
}

/// 流水线定义，创建后不可修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineDefinition {
    pub pipeline_id: String,
    #[serde(rename = "task_sequence")]
    pub steps: Vec<TaskStep>,
    pub created_at: DateTime<Utc>,
}

impl PipelineDefinition {
    pub fn new<S: Into<String>>(pipeline_id: S, steps: Vec<TaskStep>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            steps,
            created_at: Utc::now(),
        }
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.task_type.as_str())
    }
}

/// 一次流水线执行的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRunResult {
    pub pipeline_id: String,
    pub output: Value,
    pub steps_executed: usize,
    pub duration_ms: u64,
}
