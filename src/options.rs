//! Sampling options controlling next-token selection.

use genai_engine::GeneratorParams;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default maximum number of generated tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 1024;

const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_TOP_K: u32 = 50;
const DEFAULT_MIN_LENGTH: usize = 0;
const DEFAULT_DO_SAMPLE: bool = false;

/// Numeric/boolean parameters for one streaming completion.
///
/// Validated lazily when a session starts; the only structural requirement
/// is non-negativity of the float parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub min_length: usize,
    pub do_sample: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            min_length: DEFAULT_MIN_LENGTH,
            do_sample: DEFAULT_DO_SAMPLE,
        }
    }
}

impl GenerationOptions {
    /// Check the non-negativity invariant.
    pub fn validate(&self) -> Result<()> {
        if self.temperature < 0.0 {
            return Err(ClientError::InvalidOptions(format!(
                "temperature must be non-negative, got {}",
                self.temperature
            )));
        }
        if self.top_p < 0.0 {
            return Err(ClientError::InvalidOptions(format!(
                "top_p must be non-negative, got {}",
                self.top_p
            )));
        }
        Ok(())
    }

    /// Forward each option as a named search option, with the total length
    /// limit derived from `max_output_tokens` plus the prompt token count.
    pub fn apply(&self, params: &mut GeneratorParams, prompt_tokens: usize) {
        params.set_int("min_length", self.min_length as i64);
        params.set_bool("do_sample", self.do_sample);
        params.set_float("temperature", self.temperature as f64);
        params.set_float("top_p", self.top_p as f64);
        params.set_int("top_k", self.top_k as i64);
        params.set_int(
            "max_length",
            (self.max_output_tokens + prompt_tokens) as i64,
        );
    }
}
