use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use orchestrator_core::{JobInvocation, MessageQueue, OrchestratorError, OrchestratorResult};

/// 内存消息队列实现
///
/// 每个队列一条 Tokio 无界通道，单队列内先进先出。消息被取出后记录为在途，
/// 直到 `ack_message` 确认。
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    /// 队列存储：队列名 -> 通道
    queues: RwLock<HashMap<String, QueueChannels>>,
    /// 已取出但尚未确认的消息ID
    in_flight: Mutex<HashSet<String>>,
    config: InMemoryQueueConfig,
}

#[derive(Debug)]
struct QueueChannels {
    sender: mpsc::UnboundedSender<JobInvocation>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<JobInvocation>>>,
    size: Arc<AtomicU32>,
    durable: bool,
}

#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// 队列最大容量（0表示无限制）
    pub max_queue_size: usize,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
        }
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::with_config(InMemoryQueueConfig::default())
    }

    pub fn with_config(config: InMemoryQueueConfig) -> Self {
        info!(max_queue_size = config.max_queue_size, "创建内存消息队列");
        Self {
            queues: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            config,
        }
    }

    /// 已取出但尚未确认的消息数量
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub async fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// 获取或创建队列通道
    async fn get_or_create_queue(&self, queue_name: &str, durable: bool) {
        let mut queues = self.queues.write().await;

        if !queues.contains_key(queue_name) {
            let (sender, receiver) = mpsc::unbounded_channel();
            queues.insert(
                queue_name.to_string(),
                QueueChannels {
                    sender,
                    receiver: Arc::new(Mutex::new(receiver)),
                    size: Arc::new(AtomicU32::new(0)),
                    durable,
                },
            );
            debug!(queue = queue_name, durable, "创建队列");
        }
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish_message(&self, queue: &str, job: &JobInvocation) -> OrchestratorResult<()> {
        self.get_or_create_queue(queue, false).await;

        let queues = self.queues.read().await;
        let channels = queues
            .get(queue)
            .ok_or_else(|| OrchestratorError::MessageQueue(format!("队列不存在: {queue}")))?;

        let current = channels.size.load(Ordering::Relaxed) as usize;
        if self.config.max_queue_size > 0 && current >= self.config.max_queue_size {
            warn!(queue, current, "队列已满，拒绝消息");
            return Err(OrchestratorError::MessageQueue(format!(
                "队列 '{queue}' 已满 ({current}/{})",
                self.config.max_queue_size
            )));
        }

        channels.sender.send(job.clone()).map_err(|e| {
            OrchestratorError::MessageQueue(format!("发送消息到队列 '{queue}' 失败: {e}"))
        })?;
        channels.size.fetch_add(1, Ordering::Relaxed);

        debug!(queue, job_id = %job.id, "消息已发布");
        Ok(())
    }

    async fn consume_message(&self, queue: &str) -> OrchestratorResult<Option<JobInvocation>> {
        let (receiver, size) = {
            let queues = self.queues.read().await;
            match queues.get(queue) {
                Some(channels) => (channels.receiver.clone(), channels.size.clone()),
                None => return Ok(None),
            }
        };

        let job = receiver.lock().await.try_recv().ok();
        if let Some(job) = &job {
            size.fetch_sub(1, Ordering::Relaxed);
            self.in_flight.lock().await.insert(job.id.to_string());
            debug!(queue, job_id = %job.id, "消息已取出");
        }
        Ok(job)
    }

    async fn ack_message(&self, job_id: &str) -> OrchestratorResult<()> {
        if !self.in_flight.lock().await.remove(job_id) {
            debug!(job_id, "确认了未在途的消息");
        }
        Ok(())
    }

    async fn create_queue(&self, queue: &str, durable: bool) -> OrchestratorResult<()> {
        self.get_or_create_queue(queue, durable).await;
        if let Some(channels) = self.queues.read().await.get(queue) {
            if channels.durable != durable {
                debug!(queue, durable = channels.durable, "队列已存在，保留原有持久化设置");
            }
        }
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> OrchestratorResult<u32> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .map(|channels| channels.size.load(Ordering::Relaxed))
            .unwrap_or(0))
    }
}
