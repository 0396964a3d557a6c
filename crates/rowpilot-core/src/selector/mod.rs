//! Selector generation.
//!
//! A picked element arrives as a [`SnapshotChain`]. The ranker turns it into
//! XPath candidates ordered from most to least durable, and the uniqueness
//! resolver tests them against the live document until one matches exactly
//! the picked element.

pub mod blacklist;
pub mod candidate;
pub mod classifier;
pub mod query;
pub mod snapshot;
pub mod uniqueness;
pub mod xpath;

pub use blacklist::{Blacklist, BlacklistEntry};
pub use candidate::{LocatorCandidate, RankedCandidates, Reliability, Tier, rank_candidates};
pub use classifier::{is_semantic, is_semantic_with, is_stable_text};
pub use query::{DocumentQuery, MatchSet, QueryError};
pub use snapshot::{ElementNode, SnapshotChain};
pub use uniqueness::{ResolvedSelector, SelectorError, UniquenessResolver};
