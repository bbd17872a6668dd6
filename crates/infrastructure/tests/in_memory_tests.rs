use serde_json::json;

use orchestrator_core::{Datastore, JobInvocation, MessageQueue};
use orchestrator_infrastructure::{InMemoryDatastore, InMemoryMessageQueue, InMemoryQueueConfig};

#[tokio::test]
async fn test_queue_is_fifo_per_queue() {
    let broker = InMemoryMessageQueue::new();
    let first = JobInvocation::new("log.data", "data-log", json!({"n": 1}));
    let second = JobInvocation::new("log.data", "data-log", json!({"n": 2}));
    let other = JobInvocation::new("push.metrics", "metrics-log", json!({}));

    broker.publish_message("data-log", &first).await.unwrap();
    broker.publish_message("metrics-log", &other).await.unwrap();
    broker.publish_message("data-log", &second).await.unwrap();

    assert_eq!(broker.get_queue_size("data-log").await.unwrap(), 2);

    let got = broker.consume_message("data-log").await.unwrap().unwrap();
    assert_eq!(got.id, first.id);
    let got = broker.consume_message("data-log").await.unwrap().unwrap();
    assert_eq!(got.id, second.id);
    assert!(broker.consume_message("data-log").await.unwrap().is_none());

    assert_eq!(broker.get_queue_size("metrics-log").await.unwrap(), 1);
}

#[tokio::test]
async fn test_consumed_messages_stay_in_flight_until_ack() {
    let broker = InMemoryMessageQueue::new();
    let job = JobInvocation::new("heartbeat", "heartbeat", json!({}));
    broker.publish_message("heartbeat", &job).await.unwrap();

    let got = broker.consume_message("heartbeat").await.unwrap().unwrap();
    assert_eq!(broker.in_flight_count().await, 1);

    broker.ack_message(&got.id.to_string()).await.unwrap();
    assert_eq!(broker.in_flight_count().await, 0);
}

#[tokio::test]
async fn test_unknown_queue_is_empty() {
    let broker = InMemoryMessageQueue::new();
    assert!(broker.consume_message("nope").await.unwrap().is_none());
    assert_eq!(broker.get_queue_size("nope").await.unwrap(), 0);
}

#[tokio::test]
async fn test_full_queue_rejects_publish() {
    let broker = InMemoryMessageQueue::with_config(InMemoryQueueConfig { max_queue_size: 1 });
    let job = JobInvocation::new("heartbeat", "heartbeat", json!({}));

    broker.publish_message("heartbeat", &job).await.unwrap();
    assert!(broker.publish_message("heartbeat", &job).await.is_err());
}

#[tokio::test]
async fn test_create_queue_is_idempotent() {
    let broker = InMemoryMessageQueue::new();
    broker.create_queue("heartbeat", true).await.unwrap();
    broker.create_queue("heartbeat", false).await.unwrap();
    assert_eq!(broker.queue_names().await, vec!["heartbeat".to_string()]);
}

#[tokio::test]
async fn test_datastore_find_and_insert() {
    let store = InMemoryDatastore::new();
    assert!(store.find("feedback").await.unwrap().is_empty());

    store
        .insert_one("feedback", json!({"rating": 5}))
        .await
        .unwrap();
    store
        .insert_one("feedback", json!({"rating": 3}))
        .await
        .unwrap();

    let docs = store.find("feedback").await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1]["rating"], json!(3));
    assert_eq!(store.count("feedback").await, 2);
    assert!(store.insert_one("", json!({})).await.is_err());
}
