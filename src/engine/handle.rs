//! Engine handle: owned, lazily constructed, constructed at most once.
//!
//! Model loading can block on disk and allocate hundreds of megabytes, so
//! the factory always runs on a blocking worker. A failed construction is
//! remembered: the handle never retries, it hands back the same error.

use crate::error::{panic_message, EngineError};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

enum Slot<E: ?Sized> {
    Empty,
    Ready(Arc<E>),
    Failed(EngineError),
    Closed,
}

/// Exclusive owner of one engine instance for one session.
pub struct EngineHandle<E: ?Sized> {
    label: &'static str,
    slot: Mutex<Slot<E>>,
    /// Constructed engine, readable while `slot` is held by a loader.
    published: RwLock<Option<Arc<E>>>,
}

impl<E: ?Sized + Send + Sync + 'static> EngineHandle<E> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slot: Mutex::new(Slot::Empty),
            published: RwLock::new(None),
        }
    }

    /// Return the engine, constructing it with `factory` on first use.
    ///
    /// Concurrent callers wait for the one in-progress construction.
    pub async fn get_or_init<F>(&self, factory: F) -> Result<Arc<E>, EngineError>
    where
        F: FnOnce() -> Result<Arc<E>, EngineError> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        match &*slot {
            Slot::Ready(engine) => return Ok(engine.clone()),
            Slot::Failed(err) => return Err(err.clone()),
            Slot::Closed => return Err(EngineError::Closed),
            Slot::Empty => {}
        }

        log::info!("[ENGINE] Loading {} engine", self.label);
        let start = std::time::Instant::now();
        let outcome = match tokio::task::spawn_blocking(factory).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => {
                Err(EngineError::Panicked(panic_message(join.into_panic())))
            }
            Err(join) => Err(EngineError::Other(join.to_string())),
        };

        match outcome {
            Ok(engine) => {
                log::info!(
                    "[ENGINE] {} engine ready in {}ms",
                    self.label,
                    start.elapsed().as_millis()
                );
                *slot = Slot::Ready(engine.clone());
                self.publish(Some(engine.clone()));
                Ok(engine)
            }
            Err(err) => {
                log::error!("[ENGINE] {} engine failed to load: {}", self.label, err);
                *slot = Slot::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// The engine if it is constructed and not closed.
    ///
    /// Never waits on the construction lock: `None` only while nothing has
    /// been constructed yet, construction failed, or the handle is closed.
    pub fn ready(&self) -> Option<Arc<E>> {
        self.published.read().ok()?.clone()
    }

    /// Drop the engine. In-flight calls keep their own reference and finish.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if matches!(&*slot, Slot::Ready(_)) {
            log::info!("[ENGINE] Releasing {} engine", self.label);
        }
        *slot = Slot::Closed;
        self.publish(None);
    }

    fn publish(&self, engine: Option<Arc<E>>) {
        match self.published.write() {
            Ok(mut published) => *published = engine,
            Err(poisoned) => *poisoned.into_inner() = engine,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}
