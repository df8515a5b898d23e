pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to broker at {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to declare exchange {exchange}: {source}")]
    DeclareExchange {
        exchange: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to declare or bind queue {queue}: {source}")]
    DeclareQueue {
        queue: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to publish to routing key {routing_key}: {source}")]
    Publish {
        routing_key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist last message to {}: {source}", path.display())]
    Persist {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("last message file {} is malformed: {source}", path.display())]
    Malformed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
