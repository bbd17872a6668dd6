use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use orchestrator_core::{Datastore, JobInvocation, OrchestratorResult, HEARTBEAT_TASK};

use crate::handler::JobHandler;

pub const HEARTBEAT_COLLECTION: &str = "heartbeats";

/// 记录一条心跳文档，用于确认调度链路存活
pub struct HeartbeatHandler {
    datastore: Arc<dyn Datastore>,
}

impl HeartbeatHandler {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait]
impl JobHandler for HeartbeatHandler {
    fn task_id(&self) -> &str {
        HEARTBEAT_TASK
    }

    async fn handle(&self, job: &JobInvocation) -> OrchestratorResult<()> {
        let document = json!({
            "job_id": job.id.to_string(),
            "enqueued_at": job.enqueued_at.to_rfc3339(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.datastore
            .insert_one(HEARTBEAT_COLLECTION, document)
            .await?;
        debug!(job_id = %job.id, "心跳已记录");
        Ok(())
    }
}
