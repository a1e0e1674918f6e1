//! # genai-runtime
//!
//! Runtime support for genai.rs: the deterministic [`ScriptedModel`]
//! backend used across the workspace's tests, and telemetry hooks for
//! generation performance measurement (TTFT, tok/s).

pub mod scripted;
pub mod telemetry;

pub use scripted::{ScriptedLoader, ScriptedModel};
pub use telemetry::{
    GenerationMetrics, GenerationTimer, LogTelemetry, NoopTelemetry, TelemetryHook,
};
