//! Token-level access to the opaque model capability.
//!
//! [`TokenStream`] is the thin seam between the client's session logic and
//! a [`ModelBackend`]: it encodes prompts, opens incremental decoders, and
//! configures generator handles from [`GenerationOptions`].

use std::sync::Arc;

use genai_engine::{EngineError, Generator, GeneratorParams, ModelBackend, TokenDecoder, TokenId};

use crate::error::{ClientError, Result};
use crate::options::GenerationOptions;

/// Wraps a shared model backend for one or more sessions.
#[derive(Clone)]
pub struct TokenStream {
    backend: Arc<dyn ModelBackend>,
}

impl TokenStream {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Encode a rendered prompt into a token sequence.
    pub fn encode(&self, prompt: &str) -> Result<Vec<TokenId>> {
        self.backend.encode(prompt).map_err(|e| match e {
            EngineError::Encoding(msg) => ClientError::Encoding(msg),
            other => ClientError::Encoding(other.to_string()),
        })
    }

    /// Open a fresh incremental decoder for one generation.
    pub fn decoder(&self) -> Box<dyn TokenDecoder> {
        self.backend.decoder()
    }

    /// Configure a generator over the prompt tokens from the given options.
    pub fn begin(
        &self,
        tokens: &[TokenId],
        options: &GenerationOptions,
    ) -> Result<Box<dyn Generator>> {
        let mut params = GeneratorParams::new();
        options.apply(&mut params, tokens.len());
        self.backend
            .begin(tokens, &params)
            .map_err(|e| ClientError::Encoding(e.to_string()))
    }
}
