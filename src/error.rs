//! Error types shared across the capture, engine and session domains.
//!
//! Construction failures are stored in UI state and therefore must be
//! `Clone`; everything else is returned to the caller and logged.

use thiserror::Error;

/// Failure to construct an inference engine.
///
/// Stored in `UiState::loading_error`. Once a session holds one of these it
/// never tries to construct its engine again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("model asset not found: {0}")]
    AssetMissing(String),
    #[error("model is incompatible with this device: {0}")]
    Incompatible(String),
    #[error("not enough memory to load model: {0}")]
    OutOfMemory(String),
    #[error("engine construction panicked: {0}")]
    Panicked(String),
    #[error("engine has been closed")]
    Closed,
    #[error("engine construction failed: {0}")]
    Other(String),
}

/// Failure of a single inference call on a constructed engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Failed(String),
    #[error("inference worker panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Camera or frame-processing failure. Transient: the user may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("camera error: {0}")]
    Camera(String),
    #[error("unsupported frame rotation: {0} degrees")]
    UnsupportedRotation(u32),
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// Rejection of a request at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Engine construction failed earlier; the session accepts no more work.
    #[error("session disabled: {0}")]
    Disabled(EngineError),
    /// Engine construction has not finished yet.
    #[error("engine is still loading")]
    NotReady,
    /// A streaming request is still in flight.
    #[error("a request is already in flight")]
    Busy,
    #[error("session has been closed")]
    Closed,
}

/// Failure to read or write the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Render a panic payload from a blocking worker as text.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
