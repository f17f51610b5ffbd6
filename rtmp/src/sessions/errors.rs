use crate::command_builder::CommandBuilderError;
use thiserror::Error;

/// Errors a server session can run into.  Malformed or unexpected input from the peer is not an
/// error; only failures to produce outbound messages are.
#[derive(Debug, Error)]
pub enum ServerSessionError {
    #[error("Failed to build an outbound message: {0}")]
    OutboundMessage(#[from] CommandBuilderError),
}
