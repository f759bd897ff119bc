//! Error types for the protocol engine.
//!
//! None of these are fatal to a [`Client`](crate::client::Client): malformed
//! lines and protocol violations are reported as diagnostics and processing
//! continues with the next line.

use thiserror::Error;

use crate::client::ConnectionState;

/// A line that could not be parsed into a [`Message`](crate::irc::Message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("empty line")]
    Empty,

    #[error("missing command token")]
    MissingCommand,
}

/// A well-formed message whose shape does not match what its handler expects.
///
/// The handler that raised it has left the state graph untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol violation in {command}: {reason}")]
pub struct ProtocolViolation {
    pub command: String,
    pub reason: String,
}

impl ProtocolViolation {
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by the client's public operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is disconnected")]
    Disconnected,

    #[error("cannot send while {0:?}")]
    NotReady(ConnectionState),

    #[error("invalid connection state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("outgoing queue already taken by a writer")]
    WriterTaken,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
