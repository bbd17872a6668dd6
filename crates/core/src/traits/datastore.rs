use async_trait::async_trait;
use serde_json::Value;

use crate::OrchestratorResult;

/// 无模式的文档存储
#[async_trait]
pub trait Datastore: Send + Sync {
    /// 返回集合中的全部文档，集合不存在时返回空列表
    async fn find(&self, collection: &str) -> OrchestratorResult<Vec<Value>>;

    async fn insert_one(&self, collection: &str, document: Value) -> OrchestratorResult<()>;
}
