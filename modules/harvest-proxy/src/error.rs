pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no free port found in range {start}-{end}")]
    NoFreePort { start: u16, end: u16 },

    #[error("failed to create CA temp directory: {0}")]
    CaDir(#[source] std::io::Error),

    #[error("failed to spawn recording proxy process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("recording proxy exited with status {status} before first use")]
    ExitedEarly { status: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
