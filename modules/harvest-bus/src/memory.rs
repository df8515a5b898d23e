use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bus::{MessageBus, QueueBinding};
use crate::delivery::Delivery;
use crate::error::Result;

/// Glob-style routing-key match supporting the subset AMQP topic exchanges
/// use in this codebase: `*` matches exactly one dot-delimited word, `#`
/// matches zero or more. Good enough for `harvest.start.*` /
/// `harvest.stop.*` style patterns without pulling in a real AMQP broker.
fn routing_key_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let key_parts: Vec<&str> = routing_key.split('.').collect();
    match_parts(&pattern_parts, &key_parts)
}

fn match_parts(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.first(), key.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(&"#"), _) => {
            if pattern.len() == 1 {
                return true;
            }
            (0..=key.len()).any(|i| match_parts(&pattern[1..], &key[i..]))
        }
        (Some(&"*"), Some(_)) => match_parts(&pattern[1..], &key[1..]),
        (Some(p), Some(k)) if p == k => match_parts(&pattern[1..], &key[1..]),
        _ => false,
    }
}

/// Same-process stand-in for a broker, used in tests that exercise the
/// consumer/producer runtimes without a real AMQP connection. Every
/// published message is delivered to every bus instance sharing the same
/// `Arc`-backed queue table whose bindings match the routing key.
pub struct InMemoryBus {
    bindings: Mutex<Vec<QueueBinding>>,
    tx: mpsc::Sender<Delivery>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Delivery>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1024);
        Self {
            bindings: Mutex::new(Vec::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Directly inject a message as if it had arrived from the broker,
    /// bypassing the routing-key match — useful for tests that don't care
    /// about binding setup.
    pub async fn inject(&self, routing_key: &str, body: Vec<u8>) {
        let _ = self
            .tx
            .send(Delivery {
                routing_key: routing_key.to_string(),
                body,
            })
            .await;
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn declare_queues(&self, bindings: &[QueueBinding]) -> Result<()> {
        self.bindings.lock().unwrap().extend(bindings.iter().cloned());
        Ok(())
    }

    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> Result<()> {
        let matches = {
            let bindings = self.bindings.lock().unwrap();
            bindings.iter().any(|b| {
                b.routing_patterns
                    .iter()
                    .any(|p| routing_key_matches(p, routing_key))
            })
        };
        if matches || self.bindings.lock().unwrap().is_empty() {
            let _ = self
                .tx
                .send(Delivery {
                    routing_key: routing_key.to_string(),
                    body,
                })
                .await;
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Delivery>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_exactly_one_segment() {
        assert!(routing_key_matches("harvest.start.*", "harvest.start.twitter"));
        assert!(!routing_key_matches(
            "harvest.start.*",
            "harvest.start.twitter.extra"
        ));
    }

    #[test]
    fn hash_matches_zero_or_more_segments() {
        assert!(routing_key_matches("harvest.#", "harvest.start.twitter"));
        assert!(routing_key_matches("harvest.#", "harvest"));
    }

    #[tokio::test]
    async fn published_message_is_received_when_bound() {
        let bus = InMemoryBus::new();
        bus.declare_queues(&[QueueBinding::new("q1", &["harvest.start.*"])])
            .await
            .unwrap();
        bus.publish("harvest.start.twitter", b"hi".to_vec())
            .await
            .unwrap();
        let delivery = bus.recv().await.unwrap().unwrap();
        assert_eq!(delivery.routing_key, "harvest.start.twitter");
    }
}
