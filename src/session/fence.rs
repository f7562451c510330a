//! Request ids and the stale-result fence.
//!
//! Every submission takes a fresh, strictly increasing id and records it as
//! the session's latest request. A result may only land while its id is
//! still the latest one. With fencing off, results land in arrival order
//! whatever request they belong to.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct RequestFence {
    last: AtomicU64,
    enabled: bool,
}

impl RequestFence {
    pub fn new(enabled: bool) -> Self {
        Self {
            last: AtomicU64::new(0),
            enabled,
        }
    }

    /// Allocate the next request id.
    pub fn next(&self) -> RequestId {
        RequestId(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether a result for `id` may be applied to state whose latest request is `latest`.
    pub fn admits(&self, latest: Option<RequestId>, id: RequestId) -> bool {
        !self.enabled || latest == Some(id)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}
