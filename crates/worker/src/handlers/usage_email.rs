use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use orchestrator_core::{Datastore, JobInvocation, OrchestratorResult, SEND_USAGE_EMAIL_TASK};

use crate::handler::JobHandler;

pub const USAGE_COLLECTION: &str = "usage";

/// 单个用户的用量汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub user_id: String,
    pub user_email: Option<String>,
    pub total_usage: f64,
    pub records: usize,
    pub by_task_type: BTreeMap<String, f64>,
}

/// 用量汇总的投递方，例如邮件服务
#[async_trait]
pub trait UsageNotifier: Send + Sync {
    async fn notify(&self, summaries: &[UsageSummary]) -> OrchestratorResult<()>;
}

/// 只写日志的默认投递方
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl UsageNotifier for LoggingNotifier {
    async fn notify(&self, summaries: &[UsageSummary]) -> OrchestratorResult<()> {
        for summary in summaries {
            info!(
                user_id = %summary.user_id,
                user_email = summary.user_email.as_deref().unwrap_or(""),
                total_usage = summary.total_usage,
                records = summary.records,
                "用量汇总"
            );
        }
        Ok(())
    }
}

/// 按用户汇总 `usage` 集合并交给 `UsageNotifier`
pub struct UsageEmailHandler {
    datastore: Arc<dyn Datastore>,
    notifier: Arc<dyn UsageNotifier>,
}

impl UsageEmailHandler {
    pub fn new(datastore: Arc<dyn Datastore>, notifier: Arc<dyn UsageNotifier>) -> Self {
        Self { datastore, notifier }
    }
}

/// 按 `user_id` 汇总，结果按用户ID排序；缺少用户标识的记录被跳过
pub fn summarize_usage(records: &[Value]) -> Vec<UsageSummary> {
    let mut per_user: BTreeMap<String, UsageSummary> = BTreeMap::new();

    for record in records {
        let Some(user_id) = record
            .get("user_id")
            .or_else(|| record.get("user_email"))
            .and_then(Value::as_str)
        else {
            warn!(record = %record, "用量记录缺少用户标识，已跳过");
            continue;
        };

        let usage = record.get("usage").and_then(Value::as_f64).unwrap_or(0.0);
        let task_type = record
            .get("task_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let summary = per_user
            .entry(user_id.to_string())
            .or_insert_with(|| UsageSummary {
                user_id: user_id.to_string(),
                user_email: None,
                total_usage: 0.0,
                records: 0,
                by_task_type: BTreeMap::new(),
            });
        if summary.user_email.is_none() {
            summary.user_email = record
                .get("user_email")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        summary.total_usage += usage;
        summary.records += 1;
        *summary
            .by_task_type
            .entry(task_type.to_string())
            .or_insert(0.0) += usage;
    }

    per_user.into_values().collect()
}

#[async_trait]
impl JobHandler for UsageEmailHandler {
    fn task_id(&self) -> &str {
        SEND_USAGE_EMAIL_TASK
    }

    async fn handle(&self, job: &JobInvocation) -> OrchestratorResult<()> {
        let records = self.datastore.find(USAGE_COLLECTION).await?;
        let summaries = summarize_usage(&records);
        info!(job_id = %job.id, users = summaries.len(), "发送用量汇总");
        self.notifier.notify(&summaries).await
    }
}
