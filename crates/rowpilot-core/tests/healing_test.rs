use async_trait::async_trait;
use rowpilot_core::healing::{Diagnosis, analyze_failure};
use rowpilot_core::selector::{Blacklist, BlacklistEntry, DocumentQuery, MatchSet, QueryError};
use std::collections::HashMap;

#[derive(Default)]
struct PageQuery {
    counts: HashMap<String, usize>,
}

impl PageQuery {
    fn present(mut self, selector: &str) -> Self {
        self.counts.insert(selector.to_string(), 1);
        self
    }
}

#[async_trait]
impl DocumentQuery for PageQuery {
    async fn query(&mut self, selector: &str) -> Result<MatchSet, QueryError> {
        let count = self.counts.get(selector).copied().unwrap_or(0);
        Ok(MatchSet::new(count, count > 0))
    }
}

const WIDENED: &str = "//form[@id=\"login\"]//input[@name=\"user\"]";

#[tokio::test]
async fn test_blames_the_component_that_disappeared() {
    let mut page = PageQuery::default().present("//form[@id=\"login\"]");

    let analysis = analyze_failure(WIDENED, &mut page).await.unwrap();

    assert_eq!(
        analysis.diagnosis,
        Diagnosis::Blamed(vec![BlacklistEntry::new("input", "name", "user")])
    );
    assert_eq!(analysis.summary(), "input name \"user\" no longer matches");

    let mut blacklist = Blacklist::new();
    assert_eq!(analysis.apply_to(&mut blacklist), 1);
    assert!(blacklist.contains("input", "name", "user"));
    assert_eq!(analysis.apply_to(&mut blacklist), 0);
}

#[tokio::test]
async fn test_no_blame_when_everything_vanished() {
    let mut page = PageQuery::default();

    let analysis = analyze_failure(WIDENED, &mut page).await.unwrap();

    assert!(matches!(analysis.diagnosis, Diagnosis::Unattributed { .. }));
    let mut blacklist = Blacklist::new();
    assert_eq!(analysis.apply_to(&mut blacklist), 0);
    assert!(blacklist.is_empty());
}

#[tokio::test]
async fn test_single_component_selector_is_blamed() {
    let mut page = PageQuery::default();

    let analysis = analyze_failure("//button[@data-testid=\"save\"]", &mut page)
        .await
        .unwrap();

    assert_eq!(analysis.blamed().len(), 1);
    assert_eq!(analysis.blamed()[0].attribute, "data-testid");
}

#[tokio::test]
async fn test_no_blame_when_every_component_still_matches() {
    let mut page = PageQuery::default()
        .present("//form[@id=\"login\"]")
        .present("//input[@name=\"user\"]");

    let analysis = analyze_failure(WIDENED, &mut page).await.unwrap();
    assert!(analysis.blamed().is_empty());
}

#[tokio::test]
async fn test_positional_selector_cannot_be_blamed() {
    let mut page = PageQuery::default();

    let analysis = analyze_failure("/html/body/div[2]/input[1]", &mut page)
        .await
        .unwrap();
    assert!(matches!(analysis.diagnosis, Diagnosis::Unattributed { .. }));
    assert_eq!(analysis.components.len(), 2);
}
