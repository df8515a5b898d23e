pub mod controller;
pub mod error;
pub mod process_table;

pub use controller::StreamController;
pub use error::{Result, SupervisorError};
pub use process_table::ProcessSupervisor;
