use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;

// ============================================================================
// Message Publisher - Broker Abstraction
// ============================================================================
//
// The core assumes nothing about the broker beyond publish(topic, key,
// payload) -> success | failure. Delivery is at-least-once end to end: a
// publish can succeed while the outbox status update is lost, so consumers
// must dedupe by event id.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("circuit breaker open - broker unavailable")]
    CircuitOpen,

    #[error("broker error: {0}")]
    Broker(String),
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}

// ============================================================================
// In-Memory Publisher - Tests and Demo Wiring
// ============================================================================

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Records every publish and fans messages out over a broadcast channel so a
/// demo consumer can react to them. Can be told to fail the next N publishes
/// to exercise the retry and dead-letter paths.
pub struct InMemoryPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    failures_remaining: Mutex<u32>,
    feed: broadcast::Sender<PublishedMessage>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            published: Mutex::new(Vec::new()),
            failures_remaining: Mutex::new(0),
            feed,
        }
    }

    /// Every subsequent publish fails until `count` attempts have been eaten.
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().expect("publisher lock poisoned") = count;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.feed.subscribe()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .expect("publisher lock poisoned")
            .clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().expect("publisher lock poisoned").len()
    }
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        {
            let mut remaining = self.failures_remaining.lock().expect("publisher lock poisoned");
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PublishError::Broker("scripted transient failure".to_string()));
            }
        }

        let message = PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        };

        self.published
            .lock()
            .expect("publisher lock poisoned")
            .push(message.clone());

        // Nobody listening is fine; the record above is the source of truth.
        let _ = self.feed.send(message);

        Ok(())
    }
}
