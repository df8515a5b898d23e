pub mod error;
pub mod result;
pub mod snapshot;

pub use error::{Result, ResultError};
pub use result::HarvestResult;
pub use snapshot::{snapshot_path, ResultSnapshot};
