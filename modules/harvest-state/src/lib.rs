pub mod delayed;
pub mod error;
pub mod store;

pub use delayed::DelayedSetAdapter;
pub use error::{Result, StateError};
pub use store::{JsonStateStore, NullStateStore, StateStore};
