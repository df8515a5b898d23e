pub type Result<T> = std::result::Result<T, ResultError>;

#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("failed to stat WARC file {}: {source}", path.display())]
    Stat {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read result snapshot {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write result snapshot {}: {source}", path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("result snapshot {} is malformed: {source}", path.display())]
    Malformed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
