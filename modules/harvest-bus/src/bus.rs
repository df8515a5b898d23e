use async_trait::async_trait;

use crate::delivery::Delivery;
use crate::error::Result;

/// A durable queue bound to one or more topic-exchange routing patterns
/// (e.g. `harvest.start.*`), declared once before a consumer starts
/// receiving from it.
#[derive(Debug, Clone)]
pub struct QueueBinding {
    pub queue: String,
    pub routing_patterns: Vec<String>,
}

impl QueueBinding {
    pub fn new(queue: impl Into<String>, routing_patterns: &[&str]) -> Self {
        Self {
            queue: queue.into(),
            routing_patterns: routing_patterns.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Transport abstraction over the topic-exchange message bus. Concrete
/// implementations are [`crate::amqp::AmqpBus`] (a real broker connection)
/// and [`crate::memory::InMemoryBus`] (a same-process fake for tests).
///
/// A bus is expected to internally hold two distinct connections/channels —
/// one for consuming (prefetch = 1, manual ack) and one for publishing —
/// since a channel throttled to a single outstanding delivery must never
/// also be asked to publish.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Declare the durable queues this bus will receive on. Idempotent.
    async fn declare_queues(&self, bindings: &[QueueBinding]) -> Result<()>;

    /// Publish `body` under `routing_key` through the producer-side channel.
    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> Result<()>;

    /// Block until the next delivery across all declared queues arrives.
    /// Returns `None` once the bus has been closed.
    async fn recv(&self) -> Result<Option<Delivery>>;

    /// Close both channels and the underlying connection(s).
    async fn close(&self) -> Result<()>;
}
