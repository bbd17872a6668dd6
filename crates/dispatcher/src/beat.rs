use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cron_utils::CronScheduler;
use crate::router::QueueRouter;
use orchestrator_core::{
    Clock, JobInvocation, MessageQueue, OrchestratorError, OrchestratorResult, ScheduleSpec,
    HEARTBEAT_TASK, SEND_USAGE_EMAIL_TASK, UPLOAD_FEEDBACK_DUMP_TASK,
};

/// 默认的周期任务表（UTC）
pub fn default_beat_schedule() -> Vec<(&'static str, ScheduleSpec)> {
    vec![
        (HEARTBEAT_TASK, ScheduleSpec::every_seconds(300)),
        (UPLOAD_FEEDBACK_DUMP_TASK, ScheduleSpec::monthly(1, 6, 30)),
        // 1 = 周一
        (SEND_USAGE_EMAIL_TASK, ScheduleSpec::weekly(1, 3, 0)),
    ]
}

#[derive(Debug, Clone)]
enum Trigger {
    Every(Duration),
    Cron(CronScheduler),
}

impl Trigger {
    fn from_spec(spec: &ScheduleSpec) -> OrchestratorResult<Self> {
        spec.validate()?;
        match spec {
            ScheduleSpec::Interval { seconds } => {
                let seconds = i64::try_from(*seconds)
                    .map_err(|_| OrchestratorError::validation("调度间隔过大"))?;
                let period = Duration::try_seconds(seconds)
                    .ok_or_else(|| OrchestratorError::validation("调度间隔过大"))?;
                Ok(Trigger::Every(period))
            }
            ScheduleSpec::Crontab(crontab) => {
                Ok(Trigger::Cron(CronScheduler::from_crontab(crontab)?))
            }
        }
    }

    /// 严格晚于 `after` 的第一个触发点
    fn first_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Every(period) => after.checked_add_signed(*period),
            Trigger::Cron(cron) => cron.next_execution_time(after),
        }
    }

    /// 触发后推进到严格晚于 `now` 的下一个触发点，错过的触发点合并为本次
    fn advance(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Every(period) => {
                let period_ms = period.num_milliseconds().max(1);
                let missed = (now - due).num_milliseconds().max(0) / period_ms;
                let step = period_ms.checked_mul(missed + 1)?;
                due.checked_add_signed(Duration::try_milliseconds(step)?)
            }
            Trigger::Cron(cron) => cron.next_execution_time(now),
        }
    }
}

/// 周期任务条目
#[derive(Debug, Clone)]
pub struct BeatEntry {
    pub task_id: String,
    pub schedule: ScheduleSpec,
    /// 显式指定的队列，未设置时使用路由表
    pub queue: Option<String>,
    pub payload: Value,
    pub next_due: Option<DateTime<Utc>>,
    trigger: Trigger,
}

/// 周期调度器
///
/// 所有条目共享同一个逻辑时钟。每次 `tick` 找出全部到期条目，每个条目投递一次；
/// 上一次的运行是否仍在排队或执行中不影响本次投递。
pub struct BeatScheduler {
    router: Arc<QueueRouter>,
    broker: Arc<dyn MessageQueue>,
    clock: Arc<dyn Clock>,
    entries: Mutex<Vec<BeatEntry>>,
}

impl BeatScheduler {
    pub fn new(
        router: Arc<QueueRouter>,
        broker: Arc<dyn MessageQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            router,
            broker,
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// 使用默认周期任务表创建调度器
    pub async fn with_default_schedule(
        router: Arc<QueueRouter>,
        broker: Arc<dyn MessageQueue>,
        clock: Arc<dyn Clock>,
    ) -> OrchestratorResult<Self> {
        let beat = Self::new(router, broker, clock);
        for (task_id, spec) in default_beat_schedule() {
            beat.schedule(task_id, spec).await?;
        }
        Ok(beat)
    }

    pub async fn schedule(&self, task_id: &str, spec: ScheduleSpec) -> OrchestratorResult<()> {
        self.schedule_with(task_id, spec, None, json!({})).await
    }

    /// 添加或替换一个周期任务条目
    pub async fn schedule_with(
        &self,
        task_id: &str,
        spec: ScheduleSpec,
        queue: Option<String>,
        payload: Value,
    ) -> OrchestratorResult<()> {
        if task_id.trim().is_empty() {
            return Err(OrchestratorError::validation("周期任务ID不能为空"));
        }
        if let Some(queue) = &queue {
            if !self.router.is_bound(queue) {
                return Err(OrchestratorError::validation(format!(
                    "周期任务 {task_id} 指定的队列未绑定: {queue}"
                )));
            }
        }

        let trigger = Trigger::from_spec(&spec)?;
        let next_due = trigger.first_after(self.clock.now()).ok_or_else(|| {
            OrchestratorError::validation(format!("周期任务 {task_id} 的首次触发时间超出可表示范围"))
        })?;
        let entry = BeatEntry {
            task_id: task_id.to_string(),
            schedule: spec,
            queue,
            payload,
            next_due: Some(next_due),
            trigger,
        };

        info!(
            task_id,
            next_due = ?entry.next_due,
            "周期任务已登记"
        );

        let mut entries = self.entries.lock().await;
        match entries.iter_mut().find(|e| e.task_id == task_id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    pub async fn entries(&self) -> Vec<BeatEntry> {
        self.entries.lock().await.clone()
    }

    /// 处理一次时钟跳动，返回本次成功投递的任务调用
    ///
    /// 单个条目投递失败只记录日志，不影响其他条目，也不会让调度循环退出。
    pub async fn tick(&self) -> Vec<JobInvocation> {
        let now = self.clock.now();

        let due: Vec<JobInvocation> = {
            let mut entries = self.entries.lock().await;
            entries
                .iter_mut()
                .filter_map(|entry| {
                    let due_at = entry.next_due.filter(|at| *at <= now)?;
                    entry.next_due = entry.trigger.advance(due_at, now);
                    if entry.next_due.is_none() {
                        warn!(task_id = %entry.task_id, "无法计算下一次触发时间，条目停用");
                    }

                    let queue = entry
                        .queue
                        .clone()
                        .unwrap_or_else(|| self.router.route(&entry.task_id).to_string());
                    Some(JobInvocation::enqueued_at(
                        entry.task_id.clone(),
                        queue,
                        entry.payload.clone(),
                        now,
                    ))
                })
                .collect()
        };

        let mut published = Vec::with_capacity(due.len());
        for job in due {
            let task_id = job.task_id.clone();
            match self.router.submit(self.broker.as_ref(), job).await {
                Ok(job) => {
                    debug!(task_id = %job.task_id, queue = %job.queue, "周期任务已投递");
                    published.push(job);
                }
                Err(e) => {
                    error!(task_id = %task_id, "周期任务投递失败: {e}");
                }
            }
        }
        published
    }

    /// 按固定间隔驱动 `tick`，直到收到关闭信号
    pub async fn run(
        &self,
        tick_interval: StdDuration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> OrchestratorResult<()> {
        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let entry_count = self.entries.lock().await.len();
        info!(
            tick_interval_ms = tick_interval.as_millis() as u64,
            entries = entry_count,
            "周期调度器已启动"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let published = self.tick().await;
                    if !published.is_empty() {
                        info!(count = published.len(), "本次跳动投递周期任务");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("周期调度器收到关闭信号，停止调度");
                    break;
                }
            }
        }
        Ok(())
    }
}
