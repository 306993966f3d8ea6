use derive_more::Display;
use std::fmt::Display as FmtDisplay;
use std::io;
use std::net::SocketAddr;
use std::result;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;
use uuid::Error as UuidError;

use crate::frame::message_error::{AdditionalErrorInfo, ErrorBody};
use crate::frame::Opcode;

pub type Result<T> = result::Result<T, Error>;

/// Coarse classification of an [`Error`], used by retry policies and for diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Display)]
pub enum ErrorKind {
    /// A value did not match its declared type. Never reaches the wire.
    EncodeTypeMismatch,
    /// Establishing a connection (including handshake and authentication) failed.
    ConnectError,
    /// A connection was lost while the request was in flight.
    ConnectionClosed,
    /// The server reported it is overloaded or still bootstrapping.
    ServerOverloaded,
    /// The server could not reach enough replicas.
    ServerUnavailable,
    /// Any other structured server error.
    ServerError,
    /// A deadline elapsed.
    Timeout,
    /// No capacity: stream ids exhausted, pool saturated or node unavailable.
    Busy,
    /// All candidates were exhausted or the retry policy gave up.
    TerminalFailure,
    /// Malformed or unexpected data.
    Protocol,
}

/// Driver error. Errors are either raised locally (encoding, I/O, timeouts, pool state) or
/// returned by the server in ERROR frames, in which case they carry the structured
/// [`ErrorBody`] and the address of the node which sent it.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Internal IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Internal error that may be raised during `uuid::Uuid::from_bytes`
    #[error("Uuid parse error: {0}")]
    UuidParse(#[from] UuidError),
    /// General error
    #[error("General error: {0}")]
    General(String),
    /// Internal error that may be raised during `String::from_utf8`
    #[error("FromUtf8 error: {0}")]
    FromUtf8(#[from] FromUtf8Error),
    /// Internal error that may be raised during `str::from_utf8`
    #[error("Utf8 error: {0}")]
    Utf8(#[from] Utf8Error),
    /// A value cannot be encoded as the requested type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    /// Connection or handshake failure.
    #[error("Cannot connect to {addr}: {reason}")]
    Connect { addr: SocketAddr, reason: String },
    /// Authentication handshake failure.
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// The node does not speak any protocol version supported by the driver.
    #[error("Invalid protocol used when communicating with a node: {0}")]
    InvalidProtocol(SocketAddr),
    /// The connection was closed while waiting for a response.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
    /// All stream ids of a connection are in use.
    #[error("Connection to {0} is busy")]
    Busy(SocketAddr),
    /// The pool of given node has no usable connections.
    #[error("No connections available to {0}")]
    NoConnectionsAvailable(SocketAddr),
    /// Server error.
    #[error("Server {addr} error: {body:?}")]
    Server { body: ErrorBody, addr: SocketAddr },
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Request failed on all attempted nodes or retrying was not allowed.
    #[error("Request failed after trying {attempted:?}: {source}")]
    TerminalFailure {
        attempted: Vec<SocketAddr>,
        source: Box<Error>,
    },
    /// Unknown opcode in a frame header.
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),
    /// Unsupported protocol version in a frame header.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
    /// Unknown consistency.
    #[error("Unknown consistency: {0}")]
    UnknownConsistency(i16),
    /// Unknown server event.
    #[error("Unknown server event: {0}")]
    UnknownServerEvent(String),
    /// Unexpected additional error info.
    #[error("Unexpected error code: {0}")]
    UnexpectedErrorCode(i32),
    /// Unexpected write type.
    #[error("Unexpected write type: {0}")]
    UnexpectedWriteType(String),
    /// Unexpected result kind.
    #[error("Unexpected result kind: {0}")]
    UnexpectedResultKind(i32),
    /// Expected a response opcode, got something else.
    #[error("Opcode is not a response: {0}")]
    NonResponseOpcode(Opcode),
    /// Unexpected startup response.
    #[error("Unexpected startup response: {0}")]
    UnexpectedStartupResponse(Opcode),
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TypeMismatch { .. } => ErrorKind::EncodeTypeMismatch,
            Error::Connect { .. } | Error::Authentication(_) | Error::InvalidProtocol(_) => {
                ErrorKind::ConnectError
            }
            Error::Io(_) | Error::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            Error::Busy(_) | Error::NoConnectionsAvailable(_) => ErrorKind::Busy,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::TerminalFailure { .. } => ErrorKind::TerminalFailure,
            Error::Server { body, .. } => match body.additional_info {
                AdditionalErrorInfo::Overloaded | AdditionalErrorInfo::IsBootstrapping => {
                    ErrorKind::ServerOverloaded
                }
                AdditionalErrorInfo::Unavailable(_) => ErrorKind::ServerUnavailable,
                _ => ErrorKind::ServerError,
            },
            _ => ErrorKind::Protocol,
        }
    }

    /// Returns the innermost error, looking through terminal failures.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::TerminalFailure { source, .. } => source.root_cause(),
            error => error,
        }
    }

    pub(crate) fn type_mismatch(expected: impl FmtDisplay, actual: impl FmtDisplay) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub fn column_is_empty_err<T: FmtDisplay>(column_name: T) -> Error {
    Error::General(format!("Column or Udt property '{column_name}' is empty"))
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(error) => Error::Io(io::Error::new(
                error.kind(),
                error
                    .get_ref()
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
            )),
            Error::UuidParse(error) => Error::UuidParse(error.clone()),
            Error::General(error) => Error::General(error.clone()),
            Error::FromUtf8(error) => Error::FromUtf8(error.clone()),
            Error::Utf8(error) => Error::Utf8(*error),
            Error::TypeMismatch { expected, actual } => Error::TypeMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Error::Connect { addr, reason } => Error::Connect {
                addr: *addr,
                reason: reason.clone(),
            },
            Error::Authentication(error) => Error::Authentication(error.clone()),
            Error::InvalidProtocol(addr) => Error::InvalidProtocol(*addr),
            Error::ConnectionClosed(error) => Error::ConnectionClosed(error.clone()),
            Error::Busy(addr) => Error::Busy(*addr),
            Error::NoConnectionsAvailable(addr) => Error::NoConnectionsAvailable(*addr),
            Error::Server { body, addr } => Error::Server {
                body: body.clone(),
                addr: *addr,
            },
            Error::Timeout(error) => Error::Timeout(error.clone()),
            Error::TerminalFailure { attempted, source } => Error::TerminalFailure {
                attempted: attempted.clone(),
                source: source.clone(),
            },
            Error::UnknownOpcode(value) => Error::UnknownOpcode(*value),
            Error::UnsupportedVersion(value) => Error::UnsupportedVersion(*value),
            Error::UnknownConsistency(value) => Error::UnknownConsistency(*value),
            Error::UnknownServerEvent(value) => Error::UnknownServerEvent(value.clone()),
            Error::UnexpectedErrorCode(value) => Error::UnexpectedErrorCode(*value),
            Error::UnexpectedWriteType(value) => Error::UnexpectedWriteType(value.clone()),
            Error::UnexpectedResultKind(value) => Error::UnexpectedResultKind(*value),
            Error::NonResponseOpcode(value) => Error::NonResponseOpcode(*value),
            Error::UnexpectedStartupResponse(value) => Error::UnexpectedStartupResponse(*value),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use crate::error::{Error, ErrorKind};
    use crate::frame::message_error::{AdditionalErrorInfo, ErrorBody};

    fn server_error(additional_info: AdditionalErrorInfo) -> Error {
        Error::Server {
            body: ErrorBody {
                error_code: 0x1001,
                message: "".into(),
                additional_info,
            },
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9042),
        }
    }

    #[test]
    fn should_classify_server_errors() {
        assert_eq!(
            server_error(AdditionalErrorInfo::Overloaded).kind(),
            ErrorKind::ServerOverloaded
        );
        assert_eq!(
            server_error(AdditionalErrorInfo::Syntax).kind(),
            ErrorKind::ServerError
        );
    }

    #[test]
    fn should_find_root_cause_of_terminal_failure() {
        let error = Error::TerminalFailure {
            attempted: vec![],
            source: Box::new(Error::Timeout("attempt".into())),
        };

        assert_eq!(error.kind(), ErrorKind::TerminalFailure);
        assert_eq!(error.root_cause().kind(), ErrorKind::Timeout);
        assert_eq!(error.clone().root_cause().kind(), ErrorKind::Timeout);
    }
}
