//! Session domain: the inference request/response lifecycle.
//!
//! Each screen owns one session. A session holds at most one engine, turns
//! user actions into requests, and folds results into an observable
//! `UiState`:
//!   - classify.rs  one-shot requests (photo, gesture)
//!   - generate.rs  streaming requests (text generation)
//!   - store.rs     atomic snapshot store observers subscribe to
//!   - fence.rs     request ids; results of superseded requests are dropped

mod classify;
mod fence;
mod generate;
pub mod gestures;
pub mod prompts;
mod state;
mod store;

pub use classify::{ClassifyProfile, ClassifySession, EmptyOutcome, LabelMap, ResetPolicy};
pub use fence::{RequestFence, RequestId};
pub use generate::GenerateSession;
pub use prompts::PromptTemplate;
pub use state::UiState;
pub use store::StateStore;

use tokio::task::JoinHandle;

/// Handle to a dispatched request's background work.
///
/// Dropping it detaches the work; it keeps running either way.
#[derive(Debug)]
pub struct RequestTicket {
    id: RequestId,
    task: JoinHandle<()>,
}

impl RequestTicket {
    fn new(id: RequestId, task: JoinHandle<()>) -> Self {
        Self { id, task }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait until the request's result (or lack of one) has been folded into state.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            log::error!("[SESSION] Request {} task failed: {}", self.id, e);
        }
    }
}
