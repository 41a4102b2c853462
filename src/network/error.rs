use thiserror::Error;

use super::protocol::Response;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown request: {0:?}")]
    UnknownRequest(String),

    #[error("Invalid term: {0:?}")]
    InvalidTerm(String),

    #[error("Missing node identifier")]
    MissingIdentifier,

    #[error("Unknown response: {0:?}")]
    UnknownResponse(String),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out while {0}")]
    Timeout(&'static str),

    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(Response),
}
