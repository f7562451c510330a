//! Engine result types and best-candidate selection.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One labelled candidate with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub score: f32,
}

impl Category {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Candidates for one detected subject (one image head, one hand).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classifications {
    pub categories: Vec<Category>,
}

/// Full output of one classification call. Groups are in engine order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classifications: Vec<Classifications>,
}

impl ClassificationResult {
    /// Single-group result from `(label, score)` pairs.
    pub fn single<S: Into<String>>(candidates: impl IntoIterator<Item = (S, f32)>) -> Self {
        Self {
            classifications: vec![Classifications {
                categories: candidates
                    .into_iter()
                    .map(|(name, score)| Category::new(name, score))
                    .collect(),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classifications.iter().all(|c| c.categories.is_empty())
    }

    /// Engine-side options: sort each group by descending score, drop
    /// candidates under `threshold`, keep at most `max_results`.
    pub fn with_options(mut self, threshold: f32, max_results: usize) -> Self {
        for group in &mut self.classifications {
            group.categories.retain(|c| c.score >= threshold);
            group
                .categories
                .sort_by(|a, b| b.score.total_cmp(&a.score));
            group.categories.truncate(max_results);
        }
        self
    }
}

/// Pick the highest-scoring candidate of the first group at or above `threshold`.
///
/// Later groups are ignored. Ties keep the earlier candidate.
pub fn select_best(result: &ClassificationResult, threshold: f32) -> Option<&Category> {
    result
        .classifications
        .first()?
        .categories
        .iter()
        .filter(|c| c.score >= threshold)
        .fold(None, |best: Option<&Category>, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
}

/// One streamed fragment of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Set on the final fragment only.
    pub done: bool,
}

/// Ordered delivery channel handed to a text generator for one request.
///
/// Fragments arrive at the consumer in send order.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl ChunkSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Chunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver a fragment. Returns `false` once the consumer has gone away.
    pub fn send(&self, text: impl Into<String>, done: bool) -> bool {
        self.tx
            .send(Chunk {
                text: text.into(),
                done,
            })
            .is_ok()
    }
}
