use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use orchestrator_core::{OrchestratorError, OrchestratorResult, PipelineDefinition, TaskDefinition};

#[derive(Debug, Default)]
struct RegistryState {
    tasks: HashMap<String, TaskDefinition>,
    pipelines: HashMap<String, PipelineDefinition>,
}

/// 任务与流水线注册表
///
/// 临界区内只做内存读写，不跨越任何 `.await`。
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按ID插入或覆盖任务定义，返回被覆盖的旧定义
    pub async fn upsert_task(&self, task: TaskDefinition) -> Option<TaskDefinition> {
        let mut state = self.state.write().await;
        debug!(task_id = %task.id, "写入任务定义");
        state.tasks.insert(task.id.clone(), task)
    }

    pub async fn get_task(&self, task_id: &str) -> Option<TaskDefinition> {
        self.state.read().await.tasks.get(task_id).cloned()
    }

    pub async fn contains_task(&self, task_id: &str) -> bool {
        self.state.read().await.tasks.contains_key(task_id)
    }

    /// 按ID排序返回全部任务
    pub async fn list_tasks(&self) -> Vec<TaskDefinition> {
        let state = self.state.read().await;
        let mut tasks: Vec<TaskDefinition> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// 插入新的流水线
    ///
    /// ID 冲突、步骤为空或引用了未注册的任务类型时拒绝，且不做任何修改。
    /// 检查与写入在同一个写锁内完成。
    pub async fn insert_pipeline(&self, pipeline: PipelineDefinition) -> OrchestratorResult<()> {
        let mut state = self.state.write().await;

        if state.pipelines.contains_key(&pipeline.pipeline_id) {
            return Err(OrchestratorError::duplicate_pipeline(&pipeline.pipeline_id));
        }
        if pipeline.steps.is_empty() {
            return Err(OrchestratorError::validation("流水线至少需要一个步骤"));
        }
        for (index, task_type) in pipeline.task_types().enumerate() {
            if !state.tasks.contains_key(task_type) {
                return Err(OrchestratorError::validation(format!(
                    "第 {index} 步引用了未注册的任务类型: {task_type}"
                )));
            }
        }

        state
            .pipelines
            .insert(pipeline.pipeline_id.clone(), pipeline);
        Ok(())
    }

    pub async fn get_pipeline(&self, pipeline_id: &str) -> Option<PipelineDefinition> {
        self.state.read().await.pipelines.get(pipeline_id).cloned()
    }

    pub async fn list_pipelines(&self) -> Vec<PipelineDefinition> {
        let state = self.state.read().await;
        let mut pipelines: Vec<PipelineDefinition> = state.pipelines.values().cloned().collect();
        pipelines.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        pipelines
    }
}
