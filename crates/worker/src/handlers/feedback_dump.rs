use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use orchestrator_core::{Datastore, JobInvocation, OrchestratorResult, UPLOAD_FEEDBACK_DUMP_TASK};

use crate::handler::JobHandler;

pub const FEEDBACK_COLLECTION: &str = "feedback";
pub const FEEDBACK_DUMP_COLLECTION: &str = "feedback_dumps";

/// 导出列名与反馈文档字段的对应关系
const DUMP_COLUMNS: [(&str, &str); 8] = [
    ("Feedback Timestamp", "timestamp"),
    ("Feedback Language", "language"),
    ("Pipeline Tasks", "pipeline_tasks"),
    ("Input Data", "input_data"),
    ("Pipeline Response", "pipeline_response"),
    ("Suggested Pipeline Response", "suggested_response"),
    ("Pipeline Feedback", "pipeline_feedback"),
    ("Task Feedback", "task_feedback"),
];

/// 读取全部反馈，写入一条 `{timestamp, data}` 导出文档
pub struct FeedbackDumpHandler {
    datastore: Arc<dyn Datastore>,
}

impl FeedbackDumpHandler {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }

    fn dump_row(feedback: &Value) -> Value {
        let mut row = Map::new();
        let object_id = feedback
            .get("_id")
            .or_else(|| feedback.get("id"))
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        row.insert("ObjectId".to_string(), Value::String(object_id));

        for (column, field) in DUMP_COLUMNS {
            let value = feedback
                .get(field)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            row.insert(column.to_string(), value);
        }
        Value::Object(row)
    }
}

#[async_trait]
impl JobHandler for FeedbackDumpHandler {
    fn task_id(&self) -> &str {
        UPLOAD_FEEDBACK_DUMP_TASK
    }

    async fn handle(&self, job: &JobInvocation) -> OrchestratorResult<()> {
        let feedbacks = self.datastore.find(FEEDBACK_COLLECTION).await?;
        let rows: Vec<Value> = feedbacks.iter().map(Self::dump_row).collect();
        let count = rows.len();

        self.datastore
            .insert_one(
                FEEDBACK_DUMP_COLLECTION,
                json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "data": rows,
                }),
            )
            .await?;

        info!(job_id = %job.id, feedback_count = count, "反馈导出完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_become_empty_strings() {
        let row = FeedbackDumpHandler::dump_row(&json!({
            "_id": "64f0",
            "language": "hi",
            "pipeline_tasks": ["asr", "translation"]
        }));

        assert_eq!(row["ObjectId"], "64f0");
        assert_eq!(row["Feedback Language"], "hi");
        assert_eq!(row["Pipeline Tasks"], json!(["asr", "translation"]));
        assert_eq!(row["Task Feedback"], "");
        assert_eq!(row.as_object().unwrap().len(), 9);
    }
}
