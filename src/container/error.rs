#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: {0}")]
    InvalidContainerID(String),
    #[error("container `{0}` not found")]
    NotFound(String),
    #[error("failed to inspect container `{id}`: {source}")]
    Inspect {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to query runtime info: {0}")]
    Info(#[source] Box<dyn std::error::Error + Send + Sync>),
}
pub type Result<T> = std::result::Result<T, Error>;
