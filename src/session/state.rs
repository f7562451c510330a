//! UI state snapshot shared by every session kind.

use super::fence::RequestId;
use crate::capture::ModelImage;
use crate::error::EngineError;

/// Immutable per-screen state. Replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Engine construction has finished, successfully or not.
    pub loaded: bool,
    /// Construction failure; the session accepts no further requests.
    pub loading_error: Option<EngineError>,
    /// Last one-shot result: category name or gesture emoji.
    pub result: Option<String>,
    /// Subject of the last streaming request.
    pub subject: Option<String>,
    /// Streamed text accumulated for the current request.
    pub partial_text: String,
    /// `false` while a streaming request is in flight.
    pub complete: bool,
    /// Image last handed to the classifier.
    pub preview: Option<ModelImage>,
    /// Last capture failure; cleared by the next submission.
    pub capture_error: Option<String>,
    pub reactions: String,
    /// Most recently submitted request.
    pub latest_request: Option<RequestId>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            loaded: false,
            loading_error: None,
            result: None,
            subject: None,
            partial_text: String::new(),
            complete: true,
            preview: None,
            capture_error: None,
            reactions: String::new(),
            latest_request: None,
        }
    }
}

impl UiState {
    /// Whether the submit affordance should be enabled.
    pub fn enabled(&self) -> bool {
        self.loading_error.is_none() && self.complete
    }

    /// Quoted subject shown above the poem; empty until one is given.
    pub fn title(&self) -> String {
        match self.subject.as_deref() {
            Some(subject) if !subject.trim().is_empty() => format!("\"{}\"", subject),
            _ => String::new(),
        }
    }
}
