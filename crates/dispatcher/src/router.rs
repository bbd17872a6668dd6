use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use orchestrator_core::{
    JobInvocation, MessageQueue, OrchestratorError, OrchestratorResult, QueueBinding,
    HEARTBEAT_TASK, SEND_USAGE_EMAIL_TASK, UPLOAD_FEEDBACK_DUMP_TASK,
};

/// 队列路由表
///
/// 启动阶段通过 `bind_queue` / `add_route` 声明拓扑，调用 `seal` 之后拓扑不可再修改。
/// `route` 是纯函数：未映射的任务ID总是落到默认队列，从不失败。
#[derive(Debug, Clone)]
pub struct QueueRouter {
    default_queue: String,
    bindings: Vec<QueueBinding>,
    routes: HashMap<String, String>,
    sealed: bool,
}

impl QueueRouter {
    pub fn new<S: Into<String>>(default_queue: S) -> Self {
        Self {
            default_queue: default_queue.into(),
            bindings: Vec::new(),
            routes: HashMap::new(),
            sealed: false,
        }
    }

    /// 默认部署拓扑：日志、指标以及三个周期任务各自的直连队列
    pub fn default_topology<S: Into<String>>(default_queue: S) -> OrchestratorResult<Self> {
        let mut router = Self::new(default_queue);

        router.bind_queue(QueueBinding::new("data-log", "logs", "log.data", true))?;
        router.bind_queue(QueueBinding::new("metrics-log", "metrics", "push.metrics", true))?;
        router.bind_queue(QueueBinding::direct("heartbeat"))?;
        router.bind_queue(QueueBinding::direct("upload-feedback-dump"))?;
        router.bind_queue(QueueBinding::direct("send-usage-email"))?;

        router.add_route("log.data", "data-log")?;
        router.add_route("push.metrics", "metrics-log")?;
        router.add_route(HEARTBEAT_TASK, "heartbeat")?;
        router.add_route(UPLOAD_FEEDBACK_DUMP_TASK, "upload-feedback-dump")?;
        router.add_route(SEND_USAGE_EMAIL_TASK, "send-usage-email")?;

        router.seal();
        Ok(router)
    }

    pub fn bind_queue(&mut self, binding: QueueBinding) -> OrchestratorResult<()> {
        if self.sealed {
            return Err(OrchestratorError::config_error(format!(
                "队列拓扑已封存，无法绑定队列: {}",
                binding.name
            )));
        }
        if binding.name.trim().is_empty() {
            return Err(OrchestratorError::config_error("队列名不能为空"));
        }

        debug!(
            queue = %binding.name,
            exchange = %binding.exchange,
            exchange_type = %binding.exchange_type,
            routing_key = %binding.routing_key,
            "绑定队列"
        );
        self.bindings.retain(|b| b.name != binding.name);
        self.bindings.push(binding);
        Ok(())
    }

    /// 把任务ID映射到一个已绑定的队列
    pub fn add_route(&mut self, task_id: &str, queue: &str) -> OrchestratorResult<()> {
        if self.sealed {
            return Err(OrchestratorError::config_error(format!(
                "队列拓扑已封存，无法添加路由: {task_id}"
            )));
        }
        if !self.is_bound(queue) {
            return Err(OrchestratorError::config_error(format!(
                "路由目标队列未绑定: {queue}"
            )));
        }
        self.routes.insert(task_id.to_string(), queue.to_string());
        Ok(())
    }

    pub fn seal(&mut self) {
        if !self.sealed {
            info!(
                queues = self.bindings.len(),
                routes = self.routes.len(),
                default_queue = %self.default_queue,
                "队列拓扑已封存"
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn default_queue(&self) -> &str {
        &self.default_queue
    }

    pub fn bindings(&self) -> &[QueueBinding] {
        &self.bindings
    }

    pub fn is_bound(&self, queue: &str) -> bool {
        queue == self.default_queue || self.bindings.iter().any(|b| b.name == queue)
    }

    /// 解析任务ID对应的队列
    pub fn route(&self, task_id: &str) -> &str {
        self.routes
            .get(task_id)
            .map(String::as_str)
            .unwrap_or(self.default_queue.as_str())
    }

    /// 在消息代理上声明全部绑定的队列以及默认队列
    pub async fn declare_queues(&self, broker: &dyn MessageQueue) -> OrchestratorResult<()> {
        broker.create_queue(&self.default_queue, true).await?;
        for binding in &self.bindings {
            broker.create_queue(&binding.name, binding.durable).await?;
        }
        Ok(())
    }

    /// 构造一个 PENDING 状态的任务调用并投递到路由解析出的队列
    pub async fn enqueue(
        &self,
        broker: &dyn MessageQueue,
        task_id: &str,
        payload: Value,
    ) -> OrchestratorResult<JobInvocation> {
        let job = JobInvocation::new(task_id, self.route(task_id), payload);
        self.submit(broker, job).await
    }

    /// 投递已构造好的任务调用到其 `queue` 字段指定的队列
    pub async fn submit(
        &self,
        broker: &dyn MessageQueue,
        job: JobInvocation,
    ) -> OrchestratorResult<JobInvocation> {
        broker.publish_message(&job.queue, &job).await?;
        debug!(job_id = %job.id, task_id = %job.task_id, queue = %job.queue, "任务已入队");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_is_total_and_deterministic() {
        let router = QueueRouter::default_topology("default").unwrap();

        assert_eq!(router.route("log.data"), "data-log");
        assert_eq!(router.route("push.metrics"), "metrics-log");
        assert_eq!(router.route(HEARTBEAT_TASK), "heartbeat");
        assert_eq!(router.route("send.usage.email"), "send-usage-email");
        assert_eq!(router.route("unknown.task"), "default");
        assert_eq!(router.route(""), "default");

        for _ in 0..3 {
            assert_eq!(router.route("upload.feedback.dump"), "upload-feedback-dump");
        }
    }

    #[test]
    fn test_bind_after_seal_is_configuration_error() {
        let mut router = QueueRouter::default_topology("default").unwrap();
        assert!(router.is_sealed());

        let err = router
            .bind_queue(QueueBinding::direct("late"))
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));

        let err = router.add_route("x", "heartbeat").unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn test_route_to_unbound_queue_rejected() {
        let mut router = QueueRouter::new("default");
        assert!(router.add_route("a", "nowhere").is_err());
        assert!(router.add_route("a", "default").is_ok());
        assert_eq!(router.route("a"), "default");
    }

    #[test]
    fn test_default_topology_bindings() {
        let router = QueueRouter::default_topology("fallback").unwrap();
        let data_log = router
            .bindings()
            .iter()
            .find(|b| b.name == "data-log")
            .unwrap();
        assert_eq!(data_log.exchange, "logs");
        assert_eq!(data_log.routing_key, "log.data");
        assert_eq!(router.bindings().len(), 5);
        assert_eq!(router.default_queue(), "fallback");
    }
}
