//! Scripted engines: deterministic stand-ins for the native models.
//!
//! Used by the test suites and anywhere the real runtime is unavailable.
//! Each one records how it was called so tests can assert on it.

use super::types::{ChunkSink, ClassificationResult};
use super::{ClassifierFactory, GeneratorFactory, ImageClassifier, TextGenerator};
use crate::capture::ModelImage;
use crate::config::{ClassifierConfig, GeneratorConfig};
use crate::error::{EngineError, InferenceError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted classifier answer.
#[derive(Debug, Clone)]
pub struct ScriptedAnswer {
    pub delay: Duration,
    pub outcome: Result<ClassificationResult, InferenceError>,
}

impl ScriptedAnswer {
    pub fn ok(result: ClassificationResult) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(result),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(InferenceError::Failed(message.to_string())),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Classifier that replays queued answers, then repeats a fallback.
///
/// Engine options (threshold, max results) from the config it was built
/// with are applied to every answer, like a real engine would.
pub struct ScriptedClassifier {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    fallback: ClassificationResult,
    options: Mutex<Option<(f32, usize)>>,
    calls: AtomicUsize,
    last_input: Mutex<Option<(u32, u32)>>,
}

impl ScriptedClassifier {
    pub fn new(fallback: ClassificationResult) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fallback,
            options: Mutex::new(None),
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    pub fn push(&self, answer: ScriptedAnswer) {
        if let Ok(mut q) = self.answers.lock() {
            q.push_back(answer);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dimensions of the last image classified.
    pub fn last_input(&self) -> Option<(u32, u32)> {
        self.last_input.lock().ok().and_then(|g| *g)
    }

    fn configure(&self, config: &ClassifierConfig) {
        if let Ok(mut o) = self.options.lock() {
            *o = Some((config.score_threshold, config.max_results));
        }
    }
}

impl ImageClassifier for ScriptedClassifier {
    fn classify(&self, image: &ModelImage) -> Result<ClassificationResult, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_input.lock() {
            *last = Some((image.width(), image.height()));
        }
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| ScriptedAnswer::ok(self.fallback.clone()));
        if !answer.delay.is_zero() {
            std::thread::sleep(answer.delay);
        }
        let options = self.options.lock().ok().and_then(|o| *o);
        answer.outcome.map(|result| match options {
            Some((threshold, max)) => result.with_options(threshold, max),
            None => result,
        })
    }
}

/// Factory handing out one shared `ScriptedClassifier`, or failing.
pub struct ScriptedClassifierFactory {
    engine: Arc<ScriptedClassifier>,
    failure: Option<EngineError>,
    creates: AtomicUsize,
}

impl ScriptedClassifierFactory {
    pub fn new(engine: Arc<ScriptedClassifier>) -> Self {
        Self {
            engine,
            failure: None,
            creates: AtomicUsize::new(0),
        }
    }

    /// A factory whose every construction fails with `err`.
    pub fn failing(err: EngineError) -> Self {
        Self {
            engine: Arc::new(ScriptedClassifier::new(ClassificationResult::default())),
            failure: Some(err),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl ClassifierFactory for ScriptedClassifierFactory {
    fn create(&self, config: &ClassifierConfig) -> Result<Arc<dyn ImageClassifier>, EngineError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.engine.configure(config);
        Ok(self.engine.clone())
    }
}

/// How a scripted generation ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Ending {
    /// Last fragment carries `done = true`.
    Done,
    /// Sender is dropped without a terminal fragment.
    Hangup,
    /// `generate` itself fails before any fragment is sent.
    Refuse(String),
}

/// Generator that streams a fixed list of fragments from a worker thread.
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    chunk_delay: Duration,
    ending: Ending,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<S: Into<String>>(fragments: impl IntoIterator<Item = S>) -> Self {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            chunk_delay: Duration::ZERO,
            ending: Ending::Done,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str, sink: ChunkSink) -> Result<(), InferenceError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        if let Ending::Refuse(reason) = &self.ending {
            return Err(InferenceError::Failed(reason.clone()));
        }

        let fragments = self.fragments.clone();
        let delay = self.chunk_delay;
        let finish = self.ending == Ending::Done;
        std::thread::spawn(move || {
            if fragments.is_empty() {
                if finish {
                    sink.send("", true);
                }
                return;
            }
            let last = fragments.len() - 1;
            for (i, fragment) in fragments.into_iter().enumerate() {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                if !sink.send(fragment, finish && i == last) {
                    return;
                }
            }
        });
        Ok(())
    }
}

/// Factory handing out one shared `ScriptedGenerator`, or failing.
pub struct ScriptedGeneratorFactory {
    engine: Arc<ScriptedGenerator>,
    failure: Option<EngineError>,
    creates: AtomicUsize,
    load_delay: Duration,
    seeds: Mutex<Vec<u64>>,
}

impl ScriptedGeneratorFactory {
    pub fn new(engine: Arc<ScriptedGenerator>) -> Self {
        Self {
            engine,
            failure: None,
            creates: AtomicUsize::new(0),
            load_delay: Duration::ZERO,
            seeds: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: EngineError) -> Self {
        let mut factory = Self::new(Arc::new(ScriptedGenerator::new(Vec::<String>::new())));
        factory.failure = Some(err);
        factory
    }

    /// Simulate slow model loading.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn seeds(&self) -> Vec<u64> {
        self.seeds.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl GeneratorFactory for ScriptedGeneratorFactory {
    fn create(
        &self,
        _config: &GeneratorConfig,
        seed: u64,
    ) -> Result<Arc<dyn TextGenerator>, EngineError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut s) = self.seeds.lock() {
            s.push(seed);
        }
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.engine.clone()),
        }
    }
}
