/// Result type alias for `harvest-common` operations.
pub type Result<T> = std::result::Result<T, HarvestCommonError>;

#[derive(Debug, thiserror::Error)]
pub enum HarvestCommonError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
