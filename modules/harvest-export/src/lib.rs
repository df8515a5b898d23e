pub mod catalog;
pub mod error;
pub mod request;
pub mod runtime;
pub mod writer;

pub use catalog::{CatalogClient, CollectionDescriptor, InMemoryCatalog, ReqwestCatalogClient, WarcDescriptor};
pub use error::{ExportError, Result};
pub use request::{ExportFormat, ExportRequest};
pub use runtime::ExportRuntime;
pub use writer::write_segmented;
