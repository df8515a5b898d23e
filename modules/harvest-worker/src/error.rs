pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("producer failed: {0}")]
    Producer(#[source] anyhow::Error),

    #[error("failed to move WARC {from} to {to}: {source}")]
    Move {
        from: std::path::PathBuf,
        to: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] harvest_state::StateError),

    #[error(transparent)]
    ResultStore(#[from] harvest_result::ResultError),

    #[error(transparent)]
    Proxy(#[from] harvest_proxy::ProxyError),

    #[error(transparent)]
    Bus(#[from] harvest_bus::BusError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
