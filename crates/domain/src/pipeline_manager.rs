use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::registry::Registry;
use orchestrator_core::{
    InferenceDispatcher, OrchestratorError, OrchestratorResult, PipelineDefinition,
    PipelineRunResult, StepOutput, TaskConfig, TaskDefinition, TaskStep,
};

/// 流水线管理器
///
/// 负责任务注册、流水线创建以及按顺序执行流水线。每一步的后端在执行时
/// 从注册表解析，因此重新注册任务会影响之后的执行，但不会使已有流水线失效。
pub struct PipelineManager {
    registry: Arc<Registry>,
    dispatcher: Arc<dyn InferenceDispatcher>,
}

impl PipelineManager {
    pub fn new(registry: Arc<Registry>, dispatcher: Arc<dyn InferenceDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 注册任务，同ID的旧定义被直接覆盖
    pub async fn register_task(
        &self,
        task_id: &str,
        config: TaskConfig,
    ) -> OrchestratorResult<TaskDefinition> {
        if task_id.trim().is_empty() {
            return Err(OrchestratorError::validation("task_id 不能为空"));
        }

        let task = TaskDefinition::new(task_id, config);
        if self.registry.upsert_task(task.clone()).await.is_some() {
            info!(task_id, "任务定义已覆盖");
        } else {
            info!(task_id, kind = %task.kind(), "任务已注册");
        }
        Ok(task)
    }

    pub async fn create_pipeline(
        &self,
        pipeline_id: &str,
        steps: Vec<TaskStep>,
    ) -> OrchestratorResult<PipelineDefinition> {
        if pipeline_id.trim().is_empty() {
            return Err(OrchestratorError::validation("pipeline_id 不能为空"));
        }

        let pipeline = PipelineDefinition::new(pipeline_id, steps);
        self.registry.insert_pipeline(pipeline.clone()).await?;

        info!(
            pipeline_id,
            steps = pipeline.steps.len(),
            "流水线已创建"
        );
        Ok(pipeline)
    }

    pub async fn get_pipeline(&self, pipeline_id: &str) -> OrchestratorResult<PipelineDefinition> {
        self.registry
            .get_pipeline(pipeline_id)
            .await
            .ok_or_else(|| OrchestratorError::pipeline_not_found(pipeline_id))
    }

    pub async fn list_tasks(&self) -> Vec<TaskDefinition> {
        self.registry.list_tasks().await
    }

    pub async fn list_pipelines(&self) -> Vec<PipelineDefinition> {
        self.registry.list_pipelines().await
    }

    /// 顺序执行流水线
    ///
    /// 第 0 步的输入是调用方的载荷，之后每一步的输入都是上一步的输出。
    /// 任何一步失败都会立即中止，错误附带步骤序号和任务类型，不返回部分结果。
    pub async fn execute(
        &self,
        pipeline_id: &str,
        payload: Value,
    ) -> OrchestratorResult<PipelineRunResult> {
        let pipeline = self.get_pipeline(pipeline_id).await?;
        let started = Instant::now();
        let total = pipeline.steps.len();

        info!(pipeline_id, steps = total, "开始执行流水线");

        let mut current = payload;
        for (index, step) in pipeline.steps.iter().enumerate() {
            let is_last = index + 1 == total;
            current = self
                .run_step(index, step, current, is_last)
                .await
                .map_err(|e| {
                    error!(
                        pipeline_id,
                        step_index = index,
                        task_type = %step.task_type,
                        "流水线步骤失败: {e}"
                    );
                    e.at_step(index, &step.task_type)
                })?;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(pipeline_id, duration_ms, "流水线执行完成");

        Ok(PipelineRunResult {
            pipeline_id: pipeline.pipeline_id,
            output: current,
            steps_executed: total,
            duration_ms,
        })
    }

    async fn run_step(
        &self,
        index: usize,
        step: &TaskStep,
        input: Value,
        is_last: bool,
    ) -> OrchestratorResult<Value> {
        let task = self
            .registry
            .get_task(&step.task_type)
            .await
            .ok_or_else(|| OrchestratorError::task_not_found(&step.task_type))?;

        let backend = task.backend().ok_or_else(|| {
            OrchestratorError::validation(format!("任务 {} 未配置推理后端", task.id))
        })?;

        debug!(
            step_index = index,
            task_type = %step.task_type,
            protocol = %backend.protocol,
            address = %backend.address,
            "分发流水线步骤"
        );

        let request = step.config.apply_to(input);
        let raw = self.dispatcher.dispatch(request, backend).await?;

        if is_last {
            return Ok(raw);
        }
        Ok(StepOutput::decode(task.kind(), raw)?.into_next_input())
    }
}
