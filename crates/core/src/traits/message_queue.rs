use async_trait::async_trait;

use crate::{models::JobInvocation, OrchestratorResult};

/// 消息代理抽象接口
///
/// 投递语义为至少一次、单队列内先进先出；每次消费最多取出一条消息（prefetch = 1）。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布任务调用到指定队列
    async fn publish_message(&self, queue: &str, job: &JobInvocation) -> OrchestratorResult<()>;

    /// 从指定队列取出一条消息，队列为空时返回 `None`
    async fn consume_message(&self, queue: &str) -> OrchestratorResult<Option<JobInvocation>>;

    /// 确认消息处理完成
    async fn ack_message(&self, job_id: &str) -> OrchestratorResult<()>;

    /// 创建队列，已存在时不做任何事
    async fn create_queue(&self, queue: &str, durable: bool) -> OrchestratorResult<()>;

    /// 获取队列中的消息数量
    async fn get_queue_size(&self, queue: &str) -> OrchestratorResult<u32>;
}
