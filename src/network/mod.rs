pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::PeerClient;
pub use error::{NetworkError, ProtocolError};
pub use protocol::{Request, Response};
pub use server::RaftServer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_error_kind() {
        let timeout = NetworkError::Timeout("connecting");
        assert!(format!("{timeout}").contains("Timed out while connecting"));

        let closed = NetworkError::ConnectionClosed;
        assert!(format!("{closed}").contains("Connection closed"));

        let unexpected = NetworkError::UnexpectedResponse(Response::Ok);
        assert!(format!("{unexpected}").contains("OK"));
    }

    #[test]
    fn from_protocol_error_maps_to_protocol_variant() {
        let err: NetworkError = ProtocolError::MissingIdentifier.into();
        match err {
            NetworkError::Protocol(inner) => {
                assert_eq!(inner, ProtocolError::MissingIdentifier);
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
    }
}
