//! Error types for the crossbar channel system.

use thiserror::Error;

/// Errors surfaced when constructing a channel.
///
/// `send` and `recv` are infallible by contract; the only failure points in
/// this crate are configuration mistakes, caught fail-fast at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Bridged variant selected without an endpoint handle.
    #[error("bridged channel requires an endpoint handle")]
    MissingEndpoint,

    /// Variant selector matched none of the recognized channel kinds.
    #[error("unknown channel kind: {0}")]
    UnknownKind(String),
}
