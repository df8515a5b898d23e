/// A single delivered message body, already acknowledged to the broker by
/// the time it reaches a [`crate::consumer::MessageHandler`] — acking happens
/// on receipt, not on handler completion, so a crashed handler never causes
/// redelivery of a message already being worked.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
}
