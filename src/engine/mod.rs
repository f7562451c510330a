//! Engine domain: inference engine contracts.
//!
//! The pretrained models and their native runtimes are opaque. This module
//! pins down how sessions talk to them:
//!   - classifiers answer one image with one `ClassificationResult`
//!   - generators stream `Chunk`s into a `ChunkSink`, last one `done`
//!   - factories build engines from feature config, fallibly
//!
//! `scripted` provides deterministic engines for tests and headless runs.

mod handle;
pub mod scripted;
mod types;

pub use handle::EngineHandle;
pub use types::{select_best, Category, Chunk, ChunkSink, ClassificationResult, Classifications};

use crate::capture::ModelImage;
use crate::config::{ClassifierConfig, GeneratorConfig};
use crate::error::{EngineError, InferenceError};
use std::sync::Arc;

/// Image classifier or gesture recognizer.
///
/// Called from a blocking worker; may take as long as the model needs.
pub trait ImageClassifier: Send + Sync + 'static {
    fn classify(&self, image: &ModelImage) -> Result<ClassificationResult, InferenceError>;
}

/// Local language model.
pub trait TextGenerator: Send + Sync + 'static {
    /// Start generating a response to `prompt`.
    ///
    /// Fragments go to `sink` in generation order; the last carries
    /// `done = true`. May return before generation finishes. An `Err`
    /// means no terminal fragment will follow.
    fn generate(&self, prompt: &str, sink: ChunkSink) -> Result<(), InferenceError>;
}

/// Builds classifiers from feature config.
pub trait ClassifierFactory: Send + Sync + 'static {
    fn create(&self, config: &ClassifierConfig) -> Result<Arc<dyn ImageClassifier>, EngineError>;
}

/// Builds generators from feature config and a resolved sampling seed.
pub trait GeneratorFactory: Send + Sync + 'static {
    fn create(
        &self,
        config: &GeneratorConfig,
        seed: u64,
    ) -> Result<Arc<dyn TextGenerator>, EngineError>;
}
