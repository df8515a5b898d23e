pub mod error;
pub mod handler;
pub mod http_body;
pub mod iterator;
pub mod path;

pub use error::{Result, WarcError};
pub use handler::{IterItem, WarcRecordHandler};
pub use iterator::{iter_warc_items, IterFilters};
pub use path::dated_path_for_filename;
