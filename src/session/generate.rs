//! Streaming text-generation session ("terrible poem" screen).
//!
//! The engine streams fragments into a per-request channel; a single fold
//! task drains it in order, appending each fragment to `partial_text` and
//! copying the fragment's done flag into `complete`. At most one request
//! is in flight: `generate` answers `Busy` until the previous one is done.
//!
//! With `LoadPolicy::Lazy` the first request loads the model before it
//! streams; with `Eager` a request made while the model loads is `NotReady`.

use super::fence::{RequestFence, RequestId};
use super::prompts::PromptTemplate;
use super::state::UiState;
use super::store::StateStore;
use super::RequestTicket;
use crate::config::{GeneratorConfig, LoadPolicy};
use crate::engine::{ChunkSink, EngineHandle, GeneratorFactory, TextGenerator};
use crate::error::{panic_message, EngineError, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    config: GeneratorConfig,
    factory: Arc<dyn GeneratorFactory>,
    engine: EngineHandle<dyn TextGenerator>,
    template: PromptTemplate,
    store: StateStore<UiState>,
    fence: RequestFence,
    closed: AtomicBool,
}

/// Controller for one text-generation screen.
pub struct GenerateSession {
    inner: Arc<Inner>,
}

impl GenerateSession {
    /// Attach a session with the default poem template.
    ///
    /// With `LoadPolicy::Eager` (the default for generation) the model starts
    /// loading immediately, which requires a Tokio runtime context.
    pub fn attach(
        config: GeneratorConfig,
        factory: Arc<dyn GeneratorFactory>,
        fence_stale_results: bool,
    ) -> Self {
        Self::attach_with_template(config, factory, fence_stale_results, PromptTemplate::default())
    }

    pub fn attach_with_template(
        config: GeneratorConfig,
        factory: Arc<dyn GeneratorFactory>,
        fence_stale_results: bool,
        template: PromptTemplate,
    ) -> Self {
        let session = Self {
            inner: Arc::new(Inner {
                config,
                factory,
                engine: EngineHandle::new("text_generation"),
                template,
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

    /// Load the model if it isn't already; waits for an in-progress load.
    ///
    /// A failed load is final: the error is stored in state and returned
    /// again on every call without another attempt.
    pub async fn load(&self) -> Result<(), EngineError> {
        self.inner.load().await.map(|_| ())
    }

    /// Start generating for `subject`.
    ///
    /// Under `LoadPolicy::Lazy` an unloaded model is loaded by the request
    /// itself; a load failure completes it empty and disables the session.
    pub fn generate(&self, subject: &str) -> Result<RequestTicket, SessionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if let Some(err) = self.inner.store.snapshot().loading_error {
            return Err(SessionError::Disabled(err));
        }
        let engine = match self.inner.engine.ready() {
            Some(engine) => Some(engine),
            None if self.inner.config.load_policy == LoadPolicy::Lazy => None,
            None => return Err(SessionError::NotReady),
        };

        let id = self.inner.fence.next();
        let accepted = self.inner.store.update_if(|s| {
            s.complete.then(|| UiState {
                complete: false,
                partial_text: String::new(),
                subject: Some(subject.to_string()),
                reactions: String::new(),
                latest_request: Some(id),
                ..s.clone()
            })
        });
        if !accepted {
            return Err(SessionError::Busy);
        }

        let prompt = self.inner.template.render(subject);
        log::info!("[GENERATE] Request {} started ({} prompt chars)", id, prompt.len());

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let engine = match engine {
                Some(engine) => engine,
                None => match inner.load().await {
                    Ok(engine) => engine,
                    Err(err) => {
                        log::warn!("[GENERATE] Request {} dropped: {}", id, err);
                        inner.fold(id, |s| UiState {
                            complete: true,
                            ..s.clone()
                        });
                        return;
                    }
                },
            };
            inner.stream(id, engine, prompt).await
        });
        Ok(RequestTicket::new(id, task))
    }

    /// Append a reaction to the current poem's reaction log.
    pub fn add_reaction(&self, reaction: &str) {
        self.inner.store.update(|s| UiState {
            reactions: format!("{} {}", s.reactions, reaction),
            ..s.clone()
        });
    }

    pub fn state(&self) -> UiState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.store.subscribe()
    }

    /// Detach from the screen and release the model.
    ///
    /// A generation already running is not interrupted.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.engine.close().await;
    }
}

impl Inner {
    async fn load(&self) -> Result<Arc<dyn TextGenerator>, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let factory = self.factory.clone();
        let config = self.config.clone();
        let seed = config.resolve_seed();
        let outcome = self
            .engine
            .get_or_init(move || factory.create(&config, seed))
            .await;

        match outcome {
            Ok(engine) => {
                self.store.update_if(|s| {
                    (!s.loaded).then(|| UiState {
                        loaded: true,
                        loading_error: None,
                        ..s.clone()
                    })
                });
                Ok(engine)
            }
            Err(EngineError::Closed) => Err(EngineError::Closed),
            Err(err) => {
                self.store.update(|s| UiState {
                    loaded: true,
                    loading_error: Some(err.clone()),
                    ..s.clone()
                });
                Err(err)
            }
        }
    }

    async fn stream(&self, id: RequestId, engine: Arc<dyn TextGenerator>, prompt: String) {
        let start = std::time::Instant::now();
        let (sink, mut chunks) = ChunkSink::channel();
        let call = tokio::task::spawn_blocking(move || engine.generate(&prompt, sink));

        let mut received = 0usize;
        while let Some(chunk) = chunks.recv().await {
            received += 1;
            if received == 1 {
                log::info!("[GENERATE] Request {} first fragment at {}ms", id, start.elapsed().as_millis());
            }
            let done = chunk.done;
            self.fold(id, |s| UiState {
                partial_text: format!("{}{}", s.partial_text, chunk.text),
                complete: done,
                ..s.clone()
            });
            if done {
                log::info!(
                    "[GENERATE] Request {} complete: {} fragments in {}ms",
                    id,
                    received,
                    start.elapsed().as_millis()
                );
                return;
            }
        }

        // Channel closed without a terminal fragment.
        match call.await {
            Ok(Err(err)) => log::error!("[GENERATE] Request {} failed: {}", id, err),
            Err(join) if join.is_panic() => log::error!(
                "[GENERATE] Request {} panicked: {}",
                id,
                panic_message(join.into_panic())
            ),
            Err(join) => log::error!("[GENERATE] Request {} aborted: {}", id, join),
            Ok(Ok(())) => log::warn!(
                "[GENERATE] Request {} ended after {} fragments without a terminal marker",
                id,
                received
            ),
        }
        self.fold(id, |s| UiState {
            complete: true,
            ..s.clone()
        });
    }

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
            log::debug!("[GENERATE] Dropped stale fragment for {}", id);
        }
    }
}
