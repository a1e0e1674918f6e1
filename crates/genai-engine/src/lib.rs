//! # genai-engine
//!
//! The "narrow waist" of the genai.rs stack. Defines the opaque model
//! capability traits ([`ModelBackend`], [`TokenDecoder`], [`Generator`],
//! [`ModelLoader`]) and the [`GeneratorParams`] search-option bag that all
//! other crates depend on. Backends can swap implementations (native
//! runtime, FFI, scripted test double) without changing client code.
//!
//! ## Design Notes
//!
//! ### Interior Mutability
//! `ModelBackend` methods take `&self` to allow shared access across many
//! concurrent generation sessions. Per-generation mutable state lives in
//! the [`Generator`] and [`TokenDecoder`] handles, which are exclusively
//! owned by one session and never shared.
//!
//! ### Token Type
//! `TokenId` is aliased as `i32` for FFI compatibility, though token IDs
//! are logically non-negative.

use std::collections::HashMap;
use std::path::Path;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Token ID type (i32 for FFI compat; logically non-negative).
pub type TokenId = i32;

/// Top-level error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error("generation failed: {0}")]
    Generation(String),
}

/// A typed search-option value forwarded to the underlying generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOption {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Named search options controlling next-token selection.
///
/// Keys follow the underlying capability's naming (`max_length`,
/// `temperature`, `top_p`, `top_k`, `min_length`, `do_sample`). Backends
/// read the keys they understand and ignore the rest; setters accept only
/// int/float/bool shapes so unknown value kinds can never abort a
/// generation.
#[derive(Debug, Clone, Default)]
pub struct GeneratorParams {
    options: HashMap<String, SearchOption>,
}

impl GeneratorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.options.insert(key.to_string(), SearchOption::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f64) {
        self.options.insert(key.to_string(), SearchOption::Float(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.options.insert(key.to_string(), SearchOption::Bool(value));
    }

    /// Set an option from a loosely typed JSON value.
    ///
    /// Callers hand options through as free-form metadata; only integer,
    /// float, and boolean shapes are meaningful to a generator. Anything
    /// else (strings, arrays, objects, null) is silently ignored rather
    /// than erroring.
    pub fn set_json(&mut self, key: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::Bool(b) => self.set_bool(key, *b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.set_int(key, i);
                } else if let Some(f) = n.as_f64() {
                    self.set_float(key, f);
                }
            }
            _ => {}
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.options.get(key) {
            Some(SearchOption::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.options.get(key) {
            Some(SearchOption::Float(f)) => Some(*f),
            Some(SearchOption::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.options.get(key) {
            Some(SearchOption::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Number of options set.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Stateful incremental decoder converting generated tokens to text.
///
/// Decoders may buffer partial multi-byte or multi-token graphemes, so a
/// call can legitimately return an empty fragment while bytes accumulate.
/// One decoder per generation; never shared.
pub trait TokenDecoder: Send {
    /// Decode one newly generated token into a text fragment.
    fn decode(&mut self, token: TokenId) -> Result<String>;
}

/// An in-progress generation: computes logits and advances one token at a
/// time. Exclusively owned by one session; dropped when the session ends.
pub trait Generator: Send {
    /// Compute logits and advance the sequence by one token.
    fn step(&mut self) -> Result<TokenId>;

    /// True once the underlying capability reports completion
    /// (length limit reached or end token produced).
    fn is_done(&self) -> bool;
}

/// The opaque model + tokenizer capability.
///
/// Stateless after load: many sessions may read from one backend
/// concurrently. Per-generation state is isolated behind the [`Generator`]
/// and [`TokenDecoder`] handles this trait hands out.
pub trait ModelBackend: Send + Sync {
    /// Convert text into a token sequence.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Open a fresh incremental decoder for one generation.
    fn decoder(&self) -> Box<dyn TokenDecoder>;

    /// Configure and open a generator over the given prompt tokens.
    fn begin(&self, tokens: &[TokenId], params: &GeneratorParams) -> Result<Box<dyn Generator>>;
}

impl std::fmt::Debug for dyn ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend").finish_non_exhaustive()
    }
}

/// Loads a model + tokenizer pair from a directory.
///
/// Loading is expensive and runs on the blocking pool; it is not
/// interruptible once started. The init-serialization gate around calls to
/// this trait lives in the client's factory, not here.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_dir: &Path) -> Result<Box<dyn ModelBackend>>;
}
