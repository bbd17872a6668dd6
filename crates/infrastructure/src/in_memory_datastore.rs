use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use orchestrator_core::{Datastore, OrchestratorError, OrchestratorResult};

/// 内存文档存储：集合名 -> 按插入顺序保存的文档
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn find(&self, collection: &str) -> OrchestratorResult<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, document: Value) -> OrchestratorResult<()> {
        if collection.trim().is_empty() {
            return Err(OrchestratorError::Datastore("集合名不能为空".to_string()));
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
        debug!(collection, "文档已写入");
        Ok(())
    }
}
