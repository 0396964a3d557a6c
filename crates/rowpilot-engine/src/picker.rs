//! Interactive element picking.

use rowpilot_common::error::BackendError;
use rowpilot_core::SelectorPolicy;
use rowpilot_core::selector::{
    Blacklist, ResolvedSelector, SelectorError, UniquenessResolver, rank_candidates,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::resolution::BackendDocumentQuery;

#[derive(Debug, Error)]
pub enum PickError {
    #[error("Element picking failed: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Ask the user to pick an element on the current page and derive a unique
/// selector for it.
pub async fn pick_selector<B: Backend + ?Sized>(
    backend: &mut B,
    policy: &SelectorPolicy,
    blacklist: &Blacklist,
) -> Result<ResolvedSelector, PickError> {
    let chain = backend.pick_element().await?;
    debug!(tag = %chain.target().tag, depth = chain.depth(), "Element picked");

    let resolver = UniquenessResolver::new(policy, blacklist);
    let mut query = BackendDocumentQuery::new(backend);
    let resolved = resolver
        .resolve(rank_candidates(&chain, policy, blacklist), &chain, &mut query)
        .await?;

    if resolved.brittle {
        warn!(
            selector = %resolved.selector,
            "Only a position-based selector identifies this element; it will break if the \
             page layout changes"
        );
    } else {
        info!(
            selector = %resolved.selector,
            reliability = %resolved.reliability(),
            widened = resolved.widened,
            "Selector generated"
        );
    }
    Ok(resolved)
}
