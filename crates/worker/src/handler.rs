use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use orchestrator_core::{Datastore, JobInvocation, OrchestratorResult};

use crate::handlers::{FeedbackDumpHandler, HeartbeatHandler, UsageEmailHandler, UsageNotifier};

/// 后台任务处理器，按任务ID注册
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 处理器负责的任务ID
    fn task_id(&self) -> &str;

    async fn handle(&self, job: &JobInvocation) -> OrchestratorResult<()>;
}

/// 任务ID到处理器的映射
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册周期任务表中三个任务的处理器
    pub fn with_default_handlers(
        datastore: Arc<dyn Datastore>,
        notifier: Arc<dyn UsageNotifier>,
    ) -> Self {
        Self::new()
            .register(Arc::new(HeartbeatHandler::new(datastore.clone())))
            .register(Arc::new(FeedbackDumpHandler::new(datastore.clone())))
            .register(Arc::new(UsageEmailHandler::new(datastore, notifier)))
    }

    /// 注册处理器，同一任务ID后注册的覆盖先注册的
    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        let task_id = handler.task_id().to_string();
        info!(task_id = %task_id, "注册任务处理器");
        self.handlers.insert(task_id, handler);
        self
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(task_id).cloned()
    }

    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
