pub mod config;
pub mod healing;
pub mod selector;
pub mod template;

pub use config::schema::{BrowserSettings, ExecutionConfig, RowpilotConfig, SelectorPolicy};
pub use healing::{Diagnosis, FailureAnalysis, analyze_failure};
pub use selector::{
    Blacklist, BlacklistEntry, DocumentQuery, ElementNode, LocatorCandidate, MatchSet, QueryError,
    ResolvedSelector, SelectorError, SnapshotChain, Tier, UniquenessResolver, is_semantic,
    rank_candidates,
};
pub use template::{ActionTemplateError, TemplateError, resolve_expression};
