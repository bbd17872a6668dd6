use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 后台任务状态，只能单向流转：PENDING → RUNNING → SUCCEEDED / FAILED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// 一次后台任务调用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInvocation {
    pub id: Uuid,
    pub task_id: String,
    pub queue: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobInvocation {
    pub fn new<T: Into<String>, Q: Into<String>>(task_id: T, queue: Q, payload: Value) -> Self {
        Self::enqueued_at(task_id, queue, payload, Utc::now())
    }

    pub fn enqueued_at<T: Into<String>, Q: Into<String>>(
        task_id: T,
        queue: Q,
        payload: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            queue: queue.into(),
            payload,
            enqueued_at: at,
            state: JobState::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    fn transition(&mut self, next: JobState) -> OrchestratorResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(OrchestratorError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self) -> OrchestratorResult<()> {
        self.transition(JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self) -> OrchestratorResult<()> {
        self.transition(JobState::Succeeded)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail<S: Into<String>>(&mut self, error: S) -> OrchestratorResult<()> {
        self.transition(JobState::Failed)?;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some((finished - started).num_milliseconds()),
            _ => None,
        }
    }
}
