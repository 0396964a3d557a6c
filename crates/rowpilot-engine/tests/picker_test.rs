use async_trait::async_trait;
use rowpilot_core::SelectorPolicy;
use rowpilot_core::selector::{Blacklist, ElementNode, MatchSet, SelectorError, SnapshotChain, Tier};
use rowpilot_engine::backend::{Backend, BackendError, NavigationResult};
use rowpilot_engine::formatter::format_selector;
use rowpilot_engine::picker::{PickError, pick_selector};
use rowpilot_engine::recovery::recover;
use std::collections::HashMap;
use std::time::Duration;

/// A page that only answers selector queries.
struct PickPage {
    chain: Option<SnapshotChain>,
    matches: HashMap<String, MatchSet>,
    invalid: Vec<String>,
    queries: Vec<String>,
}

impl PickPage {
    fn new(chain: SnapshotChain) -> Self {
        Self {
            chain: Some(chain),
            matches: HashMap::new(),
            invalid: Vec::new(),
            queries: Vec::new(),
        }
    }

    fn with(mut self, selector: &str, count: usize, includes_target: bool) -> Self {
        self.matches
            .insert(selector.to_string(), MatchSet::new(count, includes_target));
        self
    }
}

#[async_trait]
impl Backend for PickPage {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        Ok(NavigationResult {
            url: url.to_string(),
            title: String::new(),
        })
    }
    async fn click(&mut self, _selector: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("click".into()))
    }
    async fn fill(&mut self, _selector: &str, _value: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("fill".into()))
    }
    async fn type_text(&mut self, _selector: &str, _text: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("type_text".into()))
    }
    async fn press_key(&mut self, _key: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("press_key".into()))
    }
    async fn wait_for_element(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        Ok(())
    }
    async fn query(&mut self, selector: &str) -> Result<MatchSet, BackendError> {
        self.queries.push(selector.to_string());
        if self.invalid.iter().any(|s| s == selector) {
            return Err(BackendError::SelectorInvalid {
                selector: selector.to_string(),
            });
        }
        Ok(self.matches.get(selector).copied().unwrap_or_default())
    }
    async fn pick_element(&mut self) -> Result<SnapshotChain, BackendError> {
        self.chain.take().ok_or(BackendError::PickCancelled)
    }
    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

fn search_box() -> SnapshotChain {
    SnapshotChain::new(ElementNode::new("input").attr("name", "search").at_position(1))
        .with_parent(ElementNode::new("form").attr("id", "search").at_position(1))
}

#[tokio::test]
async fn test_pick_resolves_unique_selector() {
    let mut page = PickPage::new(search_box()).with("//input[@name=\"search\"]", 1, true);

    let resolved = pick_selector(&mut page, &SelectorPolicy::default(), &Blacklist::new())
        .await
        .unwrap();

    assert_eq!(resolved.selector, "//input[@name=\"search\"]");
    assert_eq!(resolved.tier, Tier::SemanticAttr);
    assert_eq!(
        format_selector(&resolved),
        "Selector: //input[@name=\"search\"]\nReliability: high"
    );
}

#[tokio::test]
async fn test_invalid_selector_from_page_is_skipped() {
    let mut page = PickPage::new(search_box())
        .with("//form[@id=\"search\"]/input[1]", 1, true);
    page.invalid.push("//input[@name=\"search\"]".into());

    let resolved = pick_selector(&mut page, &SelectorPolicy::default(), &Blacklist::new())
        .await
        .unwrap();

    assert!(resolved.brittle);
    assert!(format_selector(&resolved).contains("Warning: position-based selector"));
}

#[tokio::test]
async fn test_cancelled_pick() {
    let mut page = PickPage::new(search_box());
    page.chain = None;

    let err = pick_selector(&mut page, &SelectorPolicy::default(), &Blacklist::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PickError::Backend(BackendError::PickCancelled)));
}

#[tokio::test]
async fn test_unresolvable_pick() {
    let mut page = PickPage::new(search_box());

    let err = pick_selector(&mut page, &SelectorPolicy::default(), &Blacklist::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PickError::Selector(SelectorError::NotFound { .. })));
}

#[tokio::test]
async fn test_recovery_avoids_blamed_attribute() {
    // The old selector used a name that the site renamed; the form is intact.
    let chain = SnapshotChain::new(
        ElementNode::new("input")
            .attr("name", "query")
            .attr("aria-label", "Search")
            .at_position(1),
    )
    .with_parent(ElementNode::new("form").attr("id", "search"));
    let mut page = PickPage::new(chain)
        .with("//form[@id=\"search\"]", 1, true)
        .with("//input[@name=\"query\"]", 1, true);
    let mut blacklist = Blacklist::new();

    let recovery = recover(
        &mut page,
        "//form[@id=\"search\"]//input[@name=\"q\"]",
        &SelectorPolicy::default(),
        &mut blacklist,
    )
    .await
    .unwrap();

    assert_eq!(recovery.newly_blacklisted, 1);
    assert!(blacklist.contains("input", "name", "q"));
    assert_eq!(recovery.resolved.selector, "//input[@name=\"query\"]");
    assert_eq!(
        recovery.analysis.summary(),
        "input name \"q\" no longer matches"
    );
}
