use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Election loop already started")]
    AlreadyStarted,
}
