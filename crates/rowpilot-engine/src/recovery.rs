//! Self-healing for selectors that stopped matching during a run.

use rowpilot_core::SelectorPolicy;
use rowpilot_core::healing::{FailureAnalysis, analyze_failure};
use rowpilot_core::selector::{Blacklist, QueryError, ResolvedSelector};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::picker::{PickError, pick_selector};
use crate::resolution::BackendDocumentQuery;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Failure analysis failed: {0}")]
    Analysis(#[from] QueryError),

    #[error(transparent)]
    Pick(#[from] PickError),
}

#[derive(Debug, Clone)]
pub struct Recovery {
    pub analysis: FailureAnalysis,
    pub resolved: ResolvedSelector,
    /// Blacklist entries added by this recovery.
    pub newly_blacklisted: usize,
}

/// Diagnose `selector`, blacklist the components it blames, then have the
/// user re-pick the element on the page as it is now.
pub async fn recover<B: Backend + ?Sized>(
    backend: &mut B,
    selector: &str,
    policy: &SelectorPolicy,
    blacklist: &mut Blacklist,
) -> Result<Recovery, RecoveryError> {
    let analysis = {
        let mut query = BackendDocumentQuery::new(&mut *backend);
        analyze_failure(selector, &mut query).await?
    };

    let newly_blacklisted = analysis.apply_to(blacklist);
    warn!(
        selector = %selector,
        blacklisted = newly_blacklisted,
        "{}",
        analysis.summary()
    );

    info!("Pick the element again on the current page");
    let resolved = pick_selector(backend, policy, blacklist).await?;

    Ok(Recovery {
        analysis,
        resolved,
        newly_blacklisted,
    })
}
