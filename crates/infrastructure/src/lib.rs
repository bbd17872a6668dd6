//! 消息代理与文档存储的内存实现，用于嵌入式部署和测试

pub mod in_memory_datastore;
pub mod in_memory_queue;

pub use in_memory_datastore::InMemoryDatastore;
pub use in_memory_queue::{InMemoryMessageQueue, InMemoryQueueConfig};
