use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use orchestrator_config::WorkerConfig;
use orchestrator_core::{JobInvocation, JobState, MessageQueue, OrchestratorError, OrchestratorResult};

use crate::handler::HandlerRegistry;

/// 后台任务工作池
///
/// 每个槽位同一时刻只持有一条任务（prefetch = 1），按轮询顺序消费配置的队列。
/// 处理器失败只把任务标记为 FAILED，槽位继续运行；不做重试。
pub struct WorkerPool {
    worker_id: String,
    broker: Arc<dyn MessageQueue>,
    handlers: Arc<HandlerRegistry>,
    queues: Vec<String>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        worker_id: impl Into<String>,
        broker: Arc<dyn MessageQueue>,
        handlers: Arc<HandlerRegistry>,
        queues: Vec<String>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            broker,
            handlers,
            queues,
            concurrency: 1,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn from_config(
        config: &WorkerConfig,
        broker: Arc<dyn MessageQueue>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        Self::new(
            config.resolved_worker_id(),
            broker,
            handlers,
            config.queues.clone(),
        )
        .with_concurrency(config.concurrency)
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 从 `cursor` 指向的队列开始轮询，取出第一条可用消息
    async fn next_job(&self, cursor: &mut usize) -> OrchestratorResult<Option<JobInvocation>> {
        let count = self.queues.len();
        for offset in 0..count {
            let index = (*cursor + offset) % count;
            if let Some(job) = self.broker.consume_message(&self.queues[index]).await? {
                *cursor = (index + 1) % count;
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// 执行一条任务并确认消息，返回任务的最终状态
    pub async fn execute(&self, mut job: JobInvocation) -> JobInvocation {
        let job_id = job.id.to_string();

        if let Err(e) = job.start() {
            warn!(job_id = %job_id, state = %job.state, error = %e, "任务状态不是 PENDING，直接确认");
            self.ack(&job_id).await;
            return job;
        }

        debug!(worker_id = %self.worker_id, job_id = %job_id, task_id = %job.task_id, "开始处理任务");
        let outcome = match self.handlers.get(&job.task_id) {
            Some(handler) => handler.handle(&job).await,
            None => Err(OrchestratorError::TaskExecution(format!(
                "没有为任务 '{}' 注册处理器",
                job.task_id
            ))),
        };

        let transition = match outcome {
            Ok(()) => job.succeed(),
            Err(e) => {
                error!(
                    worker_id = %self.worker_id,
                    job_id = %job_id,
                    task_id = %job.task_id,
                    queue = %job.queue,
                    error = %e,
                    "任务执行失败"
                );
                job.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            error!(job_id = %job_id, error = %e, "任务状态更新失败");
        }

        if job.state == JobState::Succeeded {
            info!(
                job_id = %job_id,
                task_id = %job.task_id,
                duration_ms = job.execution_duration_ms().unwrap_or_default(),
                "任务执行成功"
            );
        }

        self.ack(&job_id).await;
        job
    }

    async fn ack(&self, job_id: &str) {
        if let Err(e) = self.broker.ack_message(job_id).await {
            error!(job_id, error = %e, "确认消息失败");
        }
    }

    /// 轮询一次；取到任务时执行并返回其最终状态
    pub async fn poll_once(&self, cursor: &mut usize) -> OrchestratorResult<Option<JobInvocation>> {
        match self.next_job(cursor).await? {
            Some(job) => Ok(Some(self.execute(job).await)),
            None => Ok(None),
        }
    }

    /// 用单个槽位把所有队列处理到空为止
    pub async fn drain(&self) -> OrchestratorResult<Vec<JobInvocation>> {
        let mut cursor = 0;
        let mut processed = Vec::new();
        while let Some(job) = self.poll_once(&mut cursor).await? {
            processed.push(job);
        }
        Ok(processed)
    }

    /// 启动全部槽位，收到关闭信号后等待在途任务完成再返回
    pub async fn run(self: Arc<Self>, shutdown_rx: broadcast::Receiver<()>) -> OrchestratorResult<()> {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.concurrency,
            queues = ?self.queues,
            "工作池启动"
        );

        let slots = (0..self.concurrency)
            .map(|slot| {
                let pool = Arc::clone(&self);
                let slot_shutdown = shutdown_rx.resubscribe();
                tokio::spawn(async move { pool.run_slot(slot, slot_shutdown).await })
            })
            .collect::<Vec<_>>();

        for result in join_all(slots).await {
            if let Err(e) = result {
                error!(error = %e, "工作槽位异常退出");
            }
        }

        info!(worker_id = %self.worker_id, "工作池已停止");
        Ok(())
    }

    async fn run_slot(&self, slot: usize, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut cursor = slot % self.queues.len().max(1);

        loop {
            // 只在两条任务之间检查关闭信号，在途任务总是执行完
            match shutdown_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            match self.poll_once(&mut cursor).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(slot, error = %e, "拉取任务失败"),
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        debug!(worker_id = %self.worker_id, slot, "工作槽位退出");
    }
}
