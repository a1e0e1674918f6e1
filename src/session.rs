//! Streaming generation sessions.
//!
//! A [`GenerationSession`] drives one streaming completion: render the
//! prompt, encode it, configure a generator, then loop one token at a
//! time, yielding text fragments until the model reports completion, a
//! stop sequence appears, the caller cancels, or a step fails.
//!
//! One session is one traversal — the returned [`GenerationStream`] is
//! finite and not restartable. Structural errors (bad history, bad
//! options, encoding failure, model not ready) surface synchronously from
//! [`GenerationSession::stream`] before any fragment is produced. Errors
//! raised by the capability mid-stream do not surface at all: the loop
//! logs, truncates, and ends in the `Failed` state with every previously
//! yielded fragment still valid. Long generations degrade gracefully
//! instead of failing hard.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::Stream;
use futures::StreamExt;
use genai_runtime::{GenerationTimer, NoopTelemetry, TelemetryHook};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::message::ChatMessage;
use crate::options::GenerationOptions;
use crate::template::PromptTemplate;
use crate::token_stream::TokenStream;
use crate::tracker::SessionGuard;

/// Synthetic fragment yielded when cancellation arrives while a step is in
/// flight, so the consumer sees a clear termination cue.
pub const END_MARKER: &str = "<|end|>";

/// Observable state of a streaming completion.
///
/// Prompt rendering and encoding happen synchronously before the stream
/// exists, so `Streaming` is the state a fresh stream starts in; the other
/// three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

/// One streaming completion over a shared model backend.
pub struct GenerationSession {
    tokens: TokenStream,
    template: Option<Arc<PromptTemplate>>,
    telemetry: Arc<dyn TelemetryHook>,
}

impl GenerationSession {
    pub fn new(tokens: TokenStream, template: Option<Arc<PromptTemplate>>) -> Self {
        Self {
            tokens,
            template,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Attach a telemetry hook for TTFT / throughput reporting.
    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    /// Open a lazy stream of text fragments for the given history.
    ///
    /// Fragment boundaries follow the model's tokenization; consumers must
    /// not assume they align with words or sentences.
    pub fn stream(
        &self,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: CancellationToken,
    ) -> Result<GenerationStream> {
        // Prompting phase: everything here is synchronous and fail-fast.
        let prompt = match &self.template {
            Some(template) => template.render(history)?,
            None => PromptTemplate::default().render(history)?,
        };
        options.validate()?;
        let prompt_tokens = self.tokens.encode(&prompt)?;
        let mut generator = self.tokens.begin(&prompt_tokens, &options)?;
        let mut decoder = self.tokens.decoder();

        let stop: Vec<String> = self
            .template
            .as_ref()
            .map(|t| t.stop.clone())
            .unwrap_or_default();

        let state = Arc::new(Mutex::new(SessionState::Streaming));
        let state_handle = Arc::clone(&state);
        let mut timer = GenerationTimer::new(prompt_tokens.len(), Arc::clone(&self.telemetry));

        let inner = async_stream::stream! {
            // Accumulated text is used only for stop-sequence scanning and
            // is discarded with the stream; it is never returned whole.
            let mut accumulated = String::new();
            let final_state;

            loop {
                if cancel.is_cancelled() {
                    final_state = SessionState::Cancelled;
                    break;
                }
                if generator.is_done() {
                    final_state = SessionState::Completed;
                    break;
                }

                // The one suspension point per token: lets cancellation be
                // observed promptly even under a tight generation loop.
                tokio::task::yield_now().await;

                let step = generator.step().and_then(|token| decoder.decode(token));
                let mut fragment = match step {
                    Ok(fragment) => fragment,
                    Err(error) => {
                        tracing::warn!(%error, "generation step failed, truncating stream");
                        final_state = SessionState::Failed;
                        break;
                    }
                };

                if cancel.is_cancelled() {
                    // Cancelled while the step was in flight: substitute
                    // the end marker for this increment.
                    fragment = END_MARKER.to_string();
                    accumulated.push_str(&fragment);
                    timer.mark_token();
                    yield fragment;
                    final_state = SessionState::Cancelled;
                    break;
                }

                accumulated.push_str(&fragment);
                timer.mark_token();

                if !stop.is_empty() && stop.iter().any(|s| accumulated.contains(s.as_str())) {
                    yield fragment;
                    final_state = SessionState::Completed;
                    break;
                }

                yield fragment;
            }

            *state_handle.lock().unwrap() = final_state;
            let metrics = timer.finish();
            tracing::debug!(
                state = ?final_state,
                fragments = metrics.generated_tokens,
                tokens_per_sec = metrics.tokens_per_sec,
                "generation session finished"
            );
        };

        Ok(GenerationStream {
            inner: Box::pin(inner),
            state,
            _guard: None,
        })
    }

    /// Non-streaming convenience: drain the stream and concatenate the
    /// fragments into one assistant message. Swallowed mid-stream failures
    /// surface as a partial (possibly empty) result, cancellation as a
    /// result ending in the end marker.
    pub async fn complete(
        &self,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: CancellationToken,
    ) -> Result<ChatMessage> {
        let mut stream = self.stream(history, options, cancel)?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment);
        }
        Ok(ChatMessage::assistant(text))
    }
}

/// Lazy, finite sequence of text fragments from one session.
///
/// Dropping the stream mid-traversal releases the generator and decoder
/// handles and, when tracked, the session slot.
pub struct GenerationStream {
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
    state: Arc<Mutex<SessionState>>,
    _guard: Option<SessionGuard>,
}

impl GenerationStream {
    /// Current session state; terminal once the stream has ended.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Tie a tracker slot to this stream's lifetime.
    pub(crate) fn with_guard(mut self, guard: SessionGuard) -> Self {
        self._guard = Some(guard);
        self
    }
}

impl std::fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStream")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Stream for GenerationStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.inner.as_mut().poll_next(cx)
    }
}
