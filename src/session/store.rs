//! Observable snapshot store backed by a `watch` channel.
//!
//! Writers replace the whole snapshot under the channel lock; readers only
//! ever see complete snapshots. Safe to call from any thread.

use tokio::sync::watch;

pub struct StateStore<S> {
    tx: watch::Sender<S>,
}

impl<S: Clone + Send + Sync + 'static> StateStore<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot with `next(&current)` and notify observers.
    pub fn update<F>(&self, next: F)
    where
        F: FnOnce(&S) -> S,
    {
        self.tx.send_modify(|current| *current = next(current));
    }

    /// Like `update`, but `next` may decline by returning `None`.
    ///
    /// Observers are only notified when a new snapshot was stored.
    pub fn update_if<F>(&self, next: F) -> bool
    where
        F: FnOnce(&S) -> Option<S>,
    {
        self.tx.send_if_modified(|current| match next(current) {
            Some(state) => {
                *current = state;
                true
            }
            None => false,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}
