//! One-shot classification sessions: photo classification and live
//! gesture reactions.
//!
//! Flow per submitted frame:
//!   reset result → preprocess + release frame (blocking pool) → publish preview →
//!   load engine (first time only) → classify → select best → map label → fold
//!
//! Both screens share this implementation; `ClassifyProfile` carries the
//! differences.

use super::fence::{RequestFence, RequestId};
use super::gestures;
use super::state::UiState;
use super::store::StateStore;
use super::RequestTicket;
use crate::capture::{Camera, CameraBinding, CapturedFrame};
use crate::config::{ClassifierConfig, LoadPolicy};
use crate::engine::{select_best, ClassifierFactory, EngineHandle, ImageClassifier};
use crate::error::{panic_message, CaptureError, EngineError, InferenceError, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// What happens to the displayed result when a new request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Clear it so the screen shows "in progress".
    ClearResult,
    /// Keep showing it until something new is recognized.
    KeepResult,
}

/// What a request that finds nothing does to the displayed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyOutcome {
    /// Store "nothing found" (`result = None`).
    Clear,
    /// Leave state untouched; no update is emitted.
    Keep,
}

/// How a winning category label becomes displayed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMap {
    Verbatim,
    /// Gesture names to emoji; unknown gestures count as nothing found.
    GestureEmoji,
}

impl LabelMap {
    fn apply(self, label: &str) -> Option<String> {
        match self {
            LabelMap::Verbatim => Some(label.to_string()),
            LabelMap::GestureEmoji => gestures::emoji_for(label).map(str::to_string),
        }
    }
}

/// Per-screen behavior of a classification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyProfile {
    pub name: &'static str,
    pub reset: ResetPolicy,
    pub empty: EmptyOutcome,
    pub labels: LabelMap,
}

impl ClassifyProfile {
    pub fn take_photo() -> Self {
        Self {
            name: "take_photo",
            reset: ResetPolicy::ClearResult,
            empty: EmptyOutcome::Clear,
            labels: LabelMap::Verbatim,
        }
    }

    pub fn reaction_gesture() -> Self {
        Self {
            name: "reaction_gesture",
            reset: ResetPolicy::KeepResult,
            empty: EmptyOutcome::Keep,
            labels: LabelMap::GestureEmoji,
        }
    }
}

struct Inner {
    profile: ClassifyProfile,
    config: ClassifierConfig,
    factory: Arc<dyn ClassifierFactory>,
    engine: EngineHandle<dyn ImageClassifier>,
    store: StateStore<UiState>,
    fence: RequestFence,
    closed: AtomicBool,
}

/// Controller for one classification screen.
pub struct ClassifySession {
    inner: Arc<Inner>,
}

impl ClassifySession {
    /// Attach a session to a screen.
    ///
    /// With `LoadPolicy::Eager` the engine starts loading immediately, which
    /// requires a Tokio runtime context.
    pub fn attach(
        profile: ClassifyProfile,
        config: ClassifierConfig,
        factory: Arc<dyn ClassifierFactory>,
        fence_stale_results: bool,
    ) -> Self {
        let session = Self {
            inner: Arc::new(Inner {
                profile,
                engine: EngineHandle::new(profile.name),
                config,
                factory,
                store: StateStore::new(UiState::default()),
                fence: RequestFence::new(fence_stale_results),
                closed: AtomicBool::new(false),
            }),
        };
        if session.inner.config.load_policy == LoadPolicy::Eager {
            let inner = session.inner.clone();
            tokio::spawn(async move {
                let _ = inner.load().await;
            });
        }
        session
    }

    /// Load the engine now if it isn't already. Never retries a failed load.
    pub async fn load(&self) -> Result<(), EngineError> {
        self.inner.load().await.map(|_| ())
    }

    /// Submit a captured frame, or `None` to clear the screen.
    ///
    /// The frame is always released, whether or not it is accepted. Returns
    /// a ticket for the spawned request, or `None` when nothing was issued.
    /// Clearing supersedes any request still running, so its late result
    /// is dropped.
    pub fn submit(
        &self,
        frame: Option<CapturedFrame>,
    ) -> Result<Option<RequestTicket>, SessionError> {
        self.check_accepting()?;

        let Some(frame) = frame else {
            let id = self.inner.fence.next();
            self.inner.store.update(|s| UiState {
                result: None,
                preview: None,
                latest_request: Some(id),
                ..s.clone()
            });
            log::debug!("[CLASSIFY] {} cleared at {}", self.inner.profile.name, id);
            return Ok(None);
        };

        let id = self.inner.fence.next();
        let reset = self.inner.profile.reset;
        self.inner.store.update(|s| UiState {
            result: match reset {
                ResetPolicy::ClearResult => None,
                ResetPolicy::KeepResult => s.result.clone(),
            },
            capture_error: None,
            latest_request: Some(id),
            ..s.clone()
        });
        log::debug!("[CLASSIFY] {} request {} submitted", self.inner.profile.name, id);

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run(id, frame).await });
        Ok(Some(RequestTicket::new(id, task)))
    }

    /// Submit the outcome of a capture attempt.
    ///
    /// A capture failure is logged and shown until the next submission.
    pub fn submit_capture(
        &self,
        captured: Result<CapturedFrame, CaptureError>,
    ) -> Result<Option<RequestTicket>, SessionError> {
        match captured {
            Ok(frame) => self.submit(Some(frame)),
            Err(err) => {
                self.check_accepting()?;
                log::warn!("[CAPTURE] {} capture failed: {}", self.inner.profile.name, err);
                self.inner.store.update(|s| UiState {
                    capture_error: Some(err.to_string()),
                    ..s.clone()
                });
                Ok(None)
            }
        }
    }

    /// Take a picture with a bound camera and submit it.
    pub fn capture<C: Camera>(
        &self,
        camera: &CameraBinding<C>,
    ) -> Result<Option<RequestTicket>, SessionError> {
        self.submit_capture(camera.take_picture())
    }

    pub fn state(&self) -> UiState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.store.subscribe()
    }

    pub fn profile(&self) -> ClassifyProfile {
        self.inner.profile
    }

    /// Detach from the screen and release the engine.
    ///
    /// Requests already running finish, but nothing new is accepted.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.engine.close().await;
    }

    fn check_accepting(&self) -> Result<(), SessionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        match self.inner.store.snapshot().loading_error {
            Some(err) => Err(SessionError::Disabled(err)),
            None => Ok(()),
        }
    }
}

impl Inner {
    async fn load(&self) -> Result<Arc<dyn ImageClassifier>, EngineError> {
        let factory = self.factory.clone();
        let config = self.config.clone();
        let outcome = self
            .engine
            .get_or_init(move || factory.create(&config))
            .await;

        match &outcome {
            Ok(_) => {
                self.store.update_if(|s| {
                    (!s.loaded).then(|| UiState {
                        loaded: true,
                        ..s.clone()
                    })
                });
            }
            Err(EngineError::Closed) => {}
            Err(err) => {
                self.store.update(|s| UiState {
                    loaded: true,
                    loading_error: Some(err.clone()),
                    ..s.clone()
                });
            }
        }
        outcome
    }

    async fn run(&self, id: RequestId, frame: CapturedFrame) {
        let geometry = self.config.preprocess;
        let prepared = tokio::task::spawn_blocking(move || {
            let prepared = frame.preprocess(geometry);
            frame.close();
            prepared
        })
        .await;

        let image = match prepared {
            Ok(Ok(image)) => image,
            Err(join) => {
                log::error!("[CAPTURE] {} preprocessing for {} failed: {}", self.profile.name, id, join);
                return;
            }
            Ok(Err(err)) => {
                log::warn!("[CAPTURE] {} frame rejected: {}", self.profile.name, err);
                self.fold(id, |s| UiState {
                    capture_error: Some(err.to_string()),
                    ..s.clone()
                });
                return;
            }
        };

        self.fold(id, |s| UiState {
            preview: Some(image.clone()),
            ..s.clone()
        });

        let engine = match self.load().await {
            Ok(engine) => engine,
            Err(err) => {
                log::warn!("[CLASSIFY] {} request {} dropped: {}", self.profile.name, id, err);
                return;
            }
        };

        let start = std::time::Instant::now();
        let input = image.clone();
        let outcome = match tokio::task::spawn_blocking(move || engine.classify(&input)).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => {
                Err(InferenceError::Panicked(panic_message(join.into_panic())))
            }
            Err(join) => Err(InferenceError::Failed(join.to_string())),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                log::error!("[CLASSIFY] {} request {} failed: {}", self.profile.name, id, err);
                return;
            }
        };
        log::debug!(
            "[CLASSIFY] {} request {}: {} groups in {}ms",
            self.profile.name,
            id,
            result.classifications.len(),
            start.elapsed().as_millis()
        );

        let best = select_best(&result, self.config.score_threshold);
        let label = best.and_then(|c| self.profile.labels.apply(&c.name));
        if let Some(c) = best {
            log::info!("[CLASSIFY] {} best: {} ({:.2})", self.profile.name, c.name, c.score);
        }

        match (label, self.profile.empty) {
            (Some(label), _) => {
                self.fold(id, |s| UiState {
                    result: Some(label),
                    ..s.clone()
                });
            }
            (None, EmptyOutcome::Clear) => {
                self.fold(id, |s| UiState {
                    result: None,
                    ..s.clone()
                });
            }
            (None, EmptyOutcome::Keep) => {}
        }
    }

    /// Apply `next` unless a newer request has superseded `id`.
    fn fold<F>(&self, id: RequestId, next: F)
    where
        F: FnOnce(&UiState) -> UiState,
    {
        let applied = self.store.update_if(|s| {
            self.fence
                .admits(s.latest_request, id)
                .then(|| next(s))
        });
        if !applied {
            log::debug!("[CLASSIFY] {} dropped stale result for {}", self.profile.name, id);
        }
    }
}
