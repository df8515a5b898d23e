pub mod config;
pub mod error;
pub mod msg;
pub mod types;
pub mod util;

pub use config::BrokerConfig;
pub use error::HarvestCommonError;
pub use msg::Msg;
pub use types::{
    CollectionRef, CollectionSetRef, HarvestRef, HarvestRequest, HarvestStatus, SeedRef,
    StatusMessage, WarcCreatedMessage, WarcRef,
};
pub use util::safe_string;
