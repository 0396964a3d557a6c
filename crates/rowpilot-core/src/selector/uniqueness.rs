use serde::Serialize;
use thiserror::Error;

use super::blacklist::Blacklist;
use super::candidate::{LocatorCandidate, Reliability, Tier, anchor_selector};
use super::query::{DocumentQuery, MatchSet, QueryError};
use super::snapshot::SnapshotChain;
use crate::config::schema::SelectorPolicy;

#[derive(Debug, Clone, Error)]
pub enum SelectorError {
    #[error("No unique selector found for <{tag}> ({} candidates tried)", attempted.len())]
    NotFound { tag: String, attempted: Vec<String> },

    #[error("Picked element snapshot is empty")]
    EmptySnapshot,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// The selector chosen for a picked element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSelector {
    pub selector: String,
    pub tier: Tier,
    pub brittle: bool,
    /// Scoped under one or more ancestors to become unique.
    pub widened: bool,
}

impl ResolvedSelector {
    pub fn reliability(&self) -> Reliability {
        self.tier.reliability()
    }
}

/// Tests candidates against the live document until one identifies the
/// picked element and nothing else.
///
/// A candidate that matches several elements is widened by prefixing the
/// selectors of qualifying ancestors, nearest first, for at most
/// `max_widening_depth` ancestors.
pub struct UniquenessResolver<'a> {
    policy: &'a SelectorPolicy,
    blacklist: &'a Blacklist,
}

impl<'a> UniquenessResolver<'a> {
    pub fn new(policy: &'a SelectorPolicy, blacklist: &'a Blacklist) -> Self {
        Self { policy, blacklist }
    }

    pub async fn resolve<Q, I>(
        &self,
        candidates: I,
        chain: &SnapshotChain,
        query: &mut Q,
    ) -> Result<ResolvedSelector, SelectorError>
    where
        Q: DocumentQuery + ?Sized,
        I: IntoIterator<Item = LocatorCandidate>,
    {
        let mut attempted = Vec::new();

        for candidate in candidates {
            let found = try_query(query, &candidate.expression, &mut attempted).await?;
            let Some(matches) = found else {
                continue;
            };

            if matches.is_unique_target() {
                return Ok(accept(&candidate, candidate.expression.clone(), false));
            }

            // Zero matches, or a single match that is some other element.
            if matches.count <= 1 || candidate.tier == Tier::Position {
                continue;
            }

            if let Some(resolved) = self.widen(&candidate, chain, query, &mut attempted).await? {
                return Ok(resolved);
            }
        }

        Err(SelectorError::NotFound {
            tag: chain.target().tag.clone(),
            attempted,
        })
    }

    async fn widen<Q>(
        &self,
        candidate: &LocatorCandidate,
        chain: &SnapshotChain,
        query: &mut Q,
        attempted: &mut Vec<String>,
    ) -> Result<Option<ResolvedSelector>, QueryError>
    where
        Q: DocumentQuery + ?Sized,
    {
        let mut expression = candidate.expression.clone();
        let anchors = chain
            .ancestors()
            .filter_map(|node| anchor_selector(node, self.policy, self.blacklist))
            .take(self.policy.max_widening_depth);

        for anchor in anchors {
            expression = format!("{}{}", anchor, expression);
            let Some(matches) = try_query(query, &expression, attempted).await? else {
                return Ok(None);
            };

            if matches.is_unique_target() {
                return Ok(Some(accept(candidate, expression, true)));
            }
            if matches.count <= 1 {
                return Ok(None);
            }
        }

        Ok(None)
    }
}

/// Run one query. Expressions the document rejects yield `None`.
async fn try_query<Q>(
    query: &mut Q,
    expression: &str,
    attempted: &mut Vec<String>,
) -> Result<Option<MatchSet>, QueryError>
where
    Q: DocumentQuery + ?Sized,
{
    attempted.push(expression.to_string());
    match query.query(expression).await {
        Ok(matches) => Ok(Some(matches)),
        Err(QueryError::InvalidSelector(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn accept(candidate: &LocatorCandidate, selector: String, widened: bool) -> ResolvedSelector {
    ResolvedSelector {
        selector,
        tier: candidate.tier,
        brittle: candidate.brittle,
        widened,
    }
}
