use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of evaluating a selector against the live document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSet {
    pub count: usize,
    /// Whether the picked element is among the matches.
    pub includes_target: bool,
}

impl MatchSet {
    pub fn new(count: usize, includes_target: bool) -> Self {
        Self {
            count,
            includes_target,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Exactly one match and it is the picked element.
    pub fn is_unique_target(&self) -> bool {
        self.count == 1 && self.includes_target
    }
}

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The document rejected the expression. The candidate is skipped.
    #[error("Invalid selector expression: {0}")]
    InvalidSelector(String),

    #[error("Document query failed: {0}")]
    Backend(String),
}

/// Live-document lookup used during selector generation and healing.
///
/// Implementations compare matches against the element that was picked most
/// recently; callers without a picked element report `includes_target` as
/// `count > 0`.
#[async_trait]
pub trait DocumentQuery: Send {
    async fn query(&mut self, selector: &str) -> Result<MatchSet, QueryError>;
}
