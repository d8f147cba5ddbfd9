use thiserror::Error;

#[derive(Debug, Error)]
pub enum HaloclineError {
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Index set error: {0}")]
    IndexSet(String),
}

pub type Result<T> = std::result::Result<T, HaloclineError>;
