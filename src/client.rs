//! Client construction and lifecycle.
//!
//! [`ClientFactory`] serializes expensive model initialization behind an
//! async gate (the underlying native loader is not proven safe under
//! concurrent construction) and hands out ready [`GenAiClient`]s. Load
//! failure is reported as `None`, never an error: callers own retry
//! policy.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use genai_engine::{ModelBackend, ModelLoader};
use genai_runtime::{NoopTelemetry, TelemetryHook};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::message::ChatMessage;
use crate::options::GenerationOptions;
use crate::session::{GenerationSession, GenerationStream};
use crate::template::PromptTemplate;
use crate::token_stream::TokenStream;
use crate::tracker::SessionTracker;

/// Default limit on concurrent generation sessions per client.
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 8;

/// The loaded, ready-to-use model + tokenizer pairing.
///
/// Stateless after load: many sessions read from one handle concurrently.
/// Lifetime spans from successful initialization until explicit release
/// via [`GenAiClient::close`] (in-flight sessions keep their own reference
/// and finish undisturbed).
pub struct ModelHandle {
    backend: Arc<dyn ModelBackend>,
    model_dir: PathBuf,
}

impl ModelHandle {
    pub fn backend(&self) -> Arc<dyn ModelBackend> {
        Arc::clone(&self.backend)
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

/// A ready chat-completion client over a local model.
pub struct GenAiClient {
    handle: Mutex<Option<ModelHandle>>,
    template: Option<Arc<PromptTemplate>>,
    tracker: Arc<SessionTracker>,
    telemetry: Arc<dyn TelemetryHook>,
}

impl GenAiClient {
    fn new(handle: ModelHandle, template: Option<PromptTemplate>, max_sessions: usize) -> Self {
        Self {
            handle: Mutex::new(Some(handle)),
            template: template.map(Arc::new),
            tracker: SessionTracker::new(max_sessions),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Options used when the caller does not supply any.
    pub fn default_options() -> GenerationOptions {
        GenerationOptions::default()
    }

    /// Attach a telemetry hook applied to every session.
    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    /// Whether the model handle is loaded and unreleased.
    pub fn is_ready(&self) -> bool {
        self.handle.lock().unwrap().is_some()
    }

    /// Directory the model was loaded from, while the handle is held.
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.model_dir().to_path_buf())
    }

    pub fn template(&self) -> Option<&Arc<PromptTemplate>> {
        self.template.as_ref()
    }

    /// Tracker over this client's in-flight sessions.
    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    /// Open a streaming completion for the given history.
    ///
    /// The stream holds a tracker slot until it is drained or dropped;
    /// caller cancellation and [`SessionTracker::cancel_all`] both reach
    /// the generation loop through the slot's token.
    pub async fn stream_completion(
        &self,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: CancellationToken,
    ) -> Result<GenerationStream> {
        let backend = self
            .handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.backend())
            .ok_or(ClientError::NotReady)?;

        let guard = self.tracker.acquire(cancel).await;
        let session = GenerationSession::new(TokenStream::new(backend), self.template.clone())
            .with_telemetry(Arc::clone(&self.telemetry));
        let stream = session.stream(history, options, guard.token())?;
        Ok(stream.with_guard(guard))
    }

    /// Non-streaming completion; see [`GenerationSession::complete`].
    pub async fn complete(
        &self,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: CancellationToken,
    ) -> Result<ChatMessage> {
        use futures::StreamExt;

        let mut stream = self.stream_completion(history, options, cancel).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment);
        }
        Ok(ChatMessage::assistant(text))
    }

    /// Cancel in-flight sessions, wait for them to drain, then release the
    /// model handle. Subsequent completions fail with `NotReady`.
    pub async fn close(&self) {
        self.tracker.drain().await;
        let released = self.handle.lock().unwrap().take();
        if let Some(handle) = released {
            tracing::debug!(dir = %handle.model_dir().display(), "model handle released");
        }
    }
}

/// Serialized client construction.
///
/// At most one model load is in flight at a time across all `create`
/// calls on this factory; construct one factory per process and share it.
pub struct ClientFactory {
    loader: Arc<dyn ModelLoader>,
    gate: tokio::sync::Mutex<()>,
    max_sessions: usize,
}

impl ClientFactory {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            gate: tokio::sync::Mutex::new(()),
            max_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
        }
    }

    /// Override the per-client concurrent-session limit.
    pub fn with_max_concurrent_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Load a model directory and return a ready client, or `None` on
    /// cancellation or load failure.
    ///
    /// Cancellation is honored while waiting for the gate and immediately
    /// after acquiring it; once loading has started it runs to completion
    /// or failure on the blocking pool.
    pub async fn create(
        &self,
        model_dir: &Path,
        template: Option<PromptTemplate>,
        cancel: CancellationToken,
    ) -> Option<GenAiClient> {
        if cancel.is_cancelled() {
            return None;
        }

        let _gate = tokio::select! {
            guard = self.gate.lock() => guard,
            _ = cancel.cancelled() => {
                tracing::debug!("client creation cancelled while waiting for init gate");
                return None;
            }
        };
        if cancel.is_cancelled() {
            return None;
        }

        let loader = Arc::clone(&self.loader);
        let dir = model_dir.to_path_buf();
        let backend = match tokio::task::spawn_blocking(move || loader.load(&dir)).await {
            Ok(Ok(backend)) => backend,
            Ok(Err(error)) => {
                tracing::warn!(%error, dir = %model_dir.display(), "model load failed");
                return None;
            }
            Err(error) => {
                tracing::warn!(%error, dir = %model_dir.display(), "model load task aborted");
                return None;
            }
        };

        tracing::debug!(dir = %model_dir.display(), "model loaded");
        let handle = ModelHandle {
            backend: Arc::from(backend),
            model_dir: model_dir.to_path_buf(),
        };
        Some(GenAiClient::new(handle, template, self.max_sessions))
    }
}
