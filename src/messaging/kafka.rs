use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use std::time::Duration;

use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

use super::publisher::{MessagePublisher, PublishError};

// ============================================================================
// Kafka Publisher
// ============================================================================
//
// Production MessagePublisher backed by a Kafka-compatible broker (Kafka,
// Redpanda). Publishes go through a circuit breaker so a dead broker fails
// fast instead of stacking up timeouts; the outbox processor turns those
// failures into retries on later ticks.
//
// ============================================================================

pub struct KafkaPublisher {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl KafkaPublisher {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new(cb_config),
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, rdkafka::util::Timeout::After(Duration::from_secs(5)))
                    .await
                    .map_err(|(e, _)| e.to_string())?;

                Ok::<(), String>(())
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(topic = %topic, key = %key, "Published to broker");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %topic, "Circuit breaker open - broker unavailable");
                Err(PublishError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %topic, "Failed to publish to broker");
                Err(PublishError::Broker(e))
            }
        }
    }
}
