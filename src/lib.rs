//! # genai
//!
//! Streaming chat-completion client for local language models.
//!
//! The model and tokenizer are opaque capabilities behind the
//! `genai-engine` traits; this crate layers prompt templating over chat
//! history, a cancellation-aware token streaming loop, stop-sequence
//! truncation, serialized model initialization, and provider dispatch on
//! top of them.

pub mod client;
pub mod error;
pub mod message;
pub mod options;
pub mod registry;
pub mod session;
pub mod template;
pub mod token_stream;
pub mod tracker;

pub use client::{ClientFactory, GenAiClient, ModelHandle};
pub use error::{ClientError, Result};
pub use message::{ChatMessage, Role};
pub use options::GenerationOptions;
pub use registry::{ProviderRegistry, ResolvedModel};
pub use session::{GenerationSession, GenerationStream, SessionState, END_MARKER};
pub use template::{PromptTemplate, TEMPLATE_PLACEHOLDER};
pub use token_stream::TokenStream;
pub use tracker::{SessionGuard, SessionTracker};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
