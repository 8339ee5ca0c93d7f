use std::io;
use thiserror::Error;

/// Unified error type for the tunnel proxy
#[derive(Error, Debug)]
pub enum SocksslError {
    /// IO error on an underlying stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes were available than a fixed-size read requires
    #[error("truncated address record")]
    TruncatedInput,

    /// Unrecognized address type tag
    #[error("unknown address type {0:#04x}")]
    MalformedAddress(u8),

    /// The client-facing negotiation could not complete
    #[error("handshake rejected: {0}")]
    HandshakeRejected(&'static str),

    /// Command byte other than connect
    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),

    /// Destination or remote endpoint unreachable
    #[error("dial failed: {0}")]
    DialFailure(#[source] io::Error),

    /// Secure-transport handshake or write failure, opaque to the core
    #[error("tunnel failure: {0}")]
    TunnelFailure(#[source] io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SocksslError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display() {
        let err = SocksslError::TruncatedInput;
        assert_eq!(format!("{}", err), "truncated address record");
    }

    #[test]
    fn test_malformed_display() {
        let err = SocksslError::MalformedAddress(0x05);
        let display = format!("{}", err);
        assert!(display.contains("unknown address type"));
        assert!(display.contains("0x05"));
    }

    #[test]
    fn test_handshake_rejected_display() {
        let err = SocksslError::HandshakeRejected("no authentication required");
        let display = format!("{}", err);
        assert!(display.contains("handshake rejected"));
        assert!(display.contains("no authentication required"));
    }

    #[test]
    fn test_unsupported_command_display() {
        let err = SocksslError::UnsupportedCommand(0x03);
        assert!(format!("{}", err).contains("unsupported command"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        let err: SocksslError = io_err.into();
        assert!(format!("{}", err).contains("broken pipe"));
    }

    #[test]
    fn test_result_type_alias() {
        fn decode_stub() -> Result<u16> {
            Ok(443)
        }
        assert_eq!(decode_stub().unwrap(), 443);
    }
}
