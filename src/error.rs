//! Error types for the genai client.
//!
//! Structural/input errors (bad conversation shape, encoding failure,
//! not-ready, bad options) are fail-fast: they surface before any fragment
//! is produced. Runtime errors during an open stream are not represented
//! here — the session recovers locally by truncating (see `session`).

use thiserror::Error;

/// Errors surfaced synchronously when opening a completion.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The conversation history is malformed (a system message somewhere
    /// other than the first position).
    #[error("invalid conversation: {0}")]
    InvalidConversation(String),

    /// Generation was requested on a client whose model handle has been
    /// released or was never initialized.
    #[error("model is not ready")]
    NotReady,

    /// The tokenizer rejected the rendered prompt.
    #[error("prompt encoding failed: {0}")]
    Encoding(String),

    /// Generation options failed validation.
    #[error("invalid generation options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
