use std::path::PathBuf;

use crate::request::ExportFormat;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no WARCs found for export {id}")]
    NoWarcs { id: String },

    #[error("WARC {} referenced by the catalog is missing on disk", path.display())]
    WarcMissing { path: PathBuf },

    #[error("export format {format:?} is not yet implemented")]
    NotYetImplemented { format: ExportFormat },

    #[error("bad export request: {reason}")]
    BadRequest { reason: String },

    #[error(transparent)]
    Warc(#[from] harvest_warc::WarcError),

    #[error(transparent)]
    Bus(#[from] harvest_bus::BusError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExportError {
    /// The wire error code published in a status message's `errors` array.
    pub fn wire_code(&self) -> &'static str {
        match self {
            ExportError::NoWarcs { .. } => "no_warcs",
            ExportError::WarcMissing { .. } => "warc_missing",
            ExportError::NotYetImplemented { .. } => "unsupported_export_format",
            ExportError::BadRequest { .. } => "bad_request",
            _ => "unknown_error",
        }
    }
}
