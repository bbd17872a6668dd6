use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;

use orchestrator_core::{CrontabSpec, OrchestratorError, OrchestratorResult};

/// CRON表达式解析和调度工具
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器，表达式为六段式（秒 分 时 日 月 星期）
    pub fn new(cron_expr: &str) -> OrchestratorResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| {
            OrchestratorError::validation(format!("无效的CRON表达式 '{cron_expr}': {e}"))
        })?;

        Ok(Self {
            expression: cron_expr.to_string(),
            schedule,
        })
    }

    pub fn from_crontab(spec: &CrontabSpec) -> OrchestratorResult<Self> {
        spec.validate()?;
        Self::new(&spec.to_cron_expression())
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 获取严格晚于 `from` 的下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> OrchestratorResult<()> {
        Self::new(cron_expr).map(|_| ())
    }
}
