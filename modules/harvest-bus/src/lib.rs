pub mod amqp;
pub mod bus;
pub mod consumer;
pub mod delivery;
pub mod error;
pub mod memory;

pub use amqp::AmqpBus;
pub use bus::{MessageBus, QueueBinding};
pub use consumer::{BaseConsumer, MessageHandler};
pub use delivery::Delivery;
pub use error::{BusError, Result};
pub use memory::InMemoryBus;
