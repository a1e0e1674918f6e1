//! Deterministic scripted backend.
//!
//! [`ScriptedModel`] plays back a fixed list of text fragments, one per
//! generated token, with optional failure and mid-step callback injection.
//! It stands in for a real native runtime in tests: encoding is a trivial
//! whitespace split, and the generator honors the `max_length` search
//! option the same way a real capability would.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use genai_engine::{
    EngineError, Generator, GeneratorParams, ModelBackend, ModelLoader, Result, TokenDecoder,
    TokenId,
};

/// Callback fired at the start of each generator step, with the step index.
pub type StepHook = Arc<dyn Fn(usize) + Send + Sync>;

/// A model backend that emits a pre-scripted fragment sequence.
#[derive(Clone)]
pub struct ScriptedModel {
    script: Arc<Vec<String>>,
    fail_at_step: Option<usize>,
    fail_encode: bool,
    step_hook: Option<StepHook>,
}

impl ScriptedModel {
    /// Create a backend that generates the given fragments in order.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Arc::new(fragments.into_iter().map(Into::into).collect()),
            fail_at_step: None,
            fail_encode: false,
            step_hook: None,
        }
    }

    /// Make step `n` (zero-based) return a generation error.
    pub fn fail_at_step(mut self, n: usize) -> Self {
        self.fail_at_step = Some(n);
        self
    }

    /// Make `encode` reject every prompt.
    pub fn fail_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    /// Run a callback at the start of each step (before the token is
    /// produced). Used to inject cancellation mid-step.
    pub fn with_step_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.step_hook = Some(Arc::new(hook));
        self
    }

    /// Number of fragments in the script.
    pub fn script_len(&self) -> usize {
        self.script.len()
    }
}

impl ModelBackend for ScriptedModel {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        if self.fail_encode {
            return Err(EngineError::Encoding("scripted encode failure".to_string()));
        }
        Ok(text
            .split_whitespace()
            .enumerate()
            .map(|(i, _)| i as TokenId)
            .collect())
    }

    fn decoder(&self) -> Box<dyn TokenDecoder> {
        Box::new(ScriptedDecoder {
            script: Arc::clone(&self.script),
        })
    }

    fn begin(&self, tokens: &[TokenId], params: &GeneratorParams) -> Result<Box<dyn Generator>> {
        let max_length = params.get_int("max_length").unwrap_or(i64::MAX);
        Ok(Box::new(ScriptedGenerator {
            script_len: self.script.len(),
            prompt_len: tokens.len(),
            max_length,
            produced: 0,
            fail_at_step: self.fail_at_step,
            step_hook: self.step_hook.clone(),
        }))
    }
}

/// Decoder mapping token `n` back to the nth script fragment.
struct ScriptedDecoder {
    script: Arc<Vec<String>>,
}

impl TokenDecoder for ScriptedDecoder {
    fn decode(&mut self, token: TokenId) -> Result<String> {
        self.script
            .get(token as usize)
            .cloned()
            .ok_or_else(|| EngineError::Generation(format!("token {token} out of script range")))
    }
}

struct ScriptedGenerator {
    script_len: usize,
    prompt_len: usize,
    max_length: i64,
    produced: usize,
    fail_at_step: Option<usize>,
    step_hook: Option<StepHook>,
}

impl Generator for ScriptedGenerator {
    fn step(&mut self) -> Result<TokenId> {
        let idx = self.produced;
        if let Some(hook) = &self.step_hook {
            hook(idx);
        }
        if self.fail_at_step == Some(idx) {
            return Err(EngineError::Generation(format!(
                "scripted failure at step {idx}"
            )));
        }
        self.produced += 1;
        Ok(idx as TokenId)
    }

    fn is_done(&self) -> bool {
        self.produced >= self.script_len
            || (self.prompt_len + self.produced) as i64 >= self.max_length
    }
}

/// Model loader returning [`ScriptedModel`] instances, with configurable
/// load latency and failure, recording each load's wall-clock window so
/// tests can assert that loads never overlap.
pub struct ScriptedLoader {
    script: Vec<String>,
    delay: Option<Duration>,
    fail: bool,
    windows: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

impl ScriptedLoader {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: fragments.into_iter().map(Into::into).collect(),
            delay: None,
            fail: false,
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep for `delay` inside each load (simulates an expensive native
    /// load on the blocking pool).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every load fail after the delay elapses.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Wall-clock (start, end) windows of completed loads, in completion
    /// order.
    pub fn load_windows(&self) -> Vec<(Instant, Instant)> {
        self.windows.lock().unwrap().clone()
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, model_dir: &Path) -> Result<Box<dyn ModelBackend>> {
        let start = Instant::now();
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let end = Instant::now();
        self.windows.lock().unwrap().push((start, end));

        if self.fail {
            return Err(EngineError::ModelLoad(format!(
                "scripted load failure for {}",
                model_dir.display()
            )));
        }
        Ok(Box::new(ScriptedModel::new(self.script.clone())))
    }
}
