//! Polling consumer over a System V queue

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::TestChannel;
use ipcq_core::application::{receive_within, shutdown_channel, Consumer, MessageHandler};
use ipcq_core::domain::{ConfigError, Limit, Message};
use ipcq_core::{AppError, SendContext};

#[derive(Default)]
struct Collector {
    bodies: Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler for Collector {
    async fn handle(&self, message: Message) -> ipcq_core::Result<()> {
        let body = message.body_str().unwrap_or_default().to_string();
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

#[tokio::test]
async fn test_consumer_handles_everything_sent() {
    let channel = TestChannel::new("k");
    let producer = channel.queue();
    let collector = Arc::new(Collector::default());
    let consumer = Consumer::new(Arc::new(channel.queue()), collector.clone())
        .unwrap()
        .with_batch(Limit::AtMost(2))
        .with_idle_sleep(Duration::from_millis(10));

    for body in ["a", "b", "c"] {
        assert!(producer.send(body, &SendContext::default()).is_sent());
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let run = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    for _ in 0..200 {
        if collector.bodies.lock().unwrap().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown_tx.shutdown();

    let handled = run.await.unwrap().unwrap();
    assert_eq!(handled, 3);
    assert_eq!(*collector.bodies.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(channel.pending(), 0);
}

#[tokio::test]
async fn test_consumer_rejects_blocking_queue() {
    let channel = TestChannel::new("j");

    let result = Consumer::new(
        Arc::new(channel.blocking_queue()),
        Arc::new(Collector::default()),
    );

    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::BlockingPoll { .. }))
    ));
}

#[tokio::test]
async fn test_receive_within_times_out_on_empty_queue() {
    let channel = TestChannel::new("t");
    let queue = channel.queue();

    let received = receive_within(&queue, Limit::Unbounded, Duration::from_millis(150))
        .await
        .unwrap();

    assert!(received.is_empty());
}

#[tokio::test]
async fn test_receive_within_picks_up_late_message() {
    let channel = TestChannel::new("w");
    let queue = channel.queue();
    let producer = channel.queue();

    let send = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        producer.send("eventually", &SendContext::default()).is_sent()
    });

    let received = receive_within(&queue, Limit::Unbounded, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(send.await.unwrap());
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body_str(), Some("eventually"));
}
