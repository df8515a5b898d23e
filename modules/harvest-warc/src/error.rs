pub type Result<T> = std::result::Result<T, WarcError>;

#[derive(Debug, thiserror::Error)]
pub enum WarcError {
    #[error("failed to open WARC file {}: {source}", path.display())]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed WARC record in {}: {source}", path.display())]
    MalformedRecord {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("WARC filename {name} does not match the dated-path timestamp contract")]
    BadTimestamp { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
