use thiserror::Error;

use crate::core_interpreter::error::InputError;
use crate::core_network::error::{ProtocolError, TransportError};

/// Top-level error for a single operator command. The three families
/// mirror how the command loop reacts: input errors leave the session
/// untouched, protocol errors abort the in-flight operation, transport
/// errors mean the byte stream itself failed.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}
