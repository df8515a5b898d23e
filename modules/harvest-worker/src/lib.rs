pub mod config;
pub mod context;
pub mod error;
pub mod queue;
pub mod timers;
pub mod worker;

pub use config::HarvesterConfig;
pub use context::{HarvestContext, HarvestProducer};
pub use error::{HarvestError, Result};
pub use worker::HarvesterWorker;
