pub type Result<T> = std::result::Result<T, SupervisorError>;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("no managed process for harvest {id}")]
    NotFound { id: String },

    #[error("failed to spawn harvester process for {id}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal process for harvest {id}")]
    Signal {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
