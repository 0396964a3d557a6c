use serde::{Deserialize, Serialize};
use std::fmt;

use super::blacklist::{Blacklist, BlacklistEntry};
use super::classifier::{is_semantic_with, is_stable_text, normalize_whitespace};
use super::snapshot::{ElementNode, SnapshotChain};
use super::xpath;
use crate::config::schema::SelectorPolicy;

/// Durability tier of a candidate, most durable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Attribute added for test automation (`data-testid` and friends).
    TestingAttr,
    /// Non-random `id`, `name`, `type`, `role` or `aria-label`.
    SemanticAttr,
    /// Non-random class token.
    Structural,
    /// Visible text of a button or link.
    Text,
    /// Sibling positions below the nearest stable ancestor.
    Position,
}

impl Tier {
    pub fn reliability(&self) -> Reliability {
        match self {
            Tier::TestingAttr | Tier::SemanticAttr => Reliability::High,
            Tier::Structural | Tier::Text => Reliability::Medium,
            Tier::Position => Reliability::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reliability::High => f.write_str("high"),
            Reliability::Medium => f.write_str("medium"),
            Reliability::Low => f.write_str("low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatorCandidate {
    pub expression: String,
    pub tier: Tier,
    pub widened: bool,
    /// Depends on document structure rather than on a stable attribute.
    pub brittle: bool,
    /// Component this candidate was built from, if any.
    pub source: Option<BlacklistEntry>,
}

impl LocatorCandidate {
    fn from_component(tier: Tier, expression: String, source: BlacklistEntry) -> Self {
        Self {
            expression,
            tier,
            widened: false,
            brittle: false,
            source: Some(source),
        }
    }
}

/// Attribute-name tokens that mark a `data-*` attribute as automation-only.
const TESTING_TOKENS: &[&str] = &["qa", "cy", "e2e", "pw", "automation", "selenium", "testid"];

fn is_testing_like(name: &str, policy: &SelectorPolicy) -> bool {
    if policy.testing_attributes.iter().any(|a| a == name) {
        return false;
    }
    let Some(rest) = name.strip_prefix("data-") else {
        return false;
    };
    rest.split(['-', '_'])
        .any(|token| TESTING_TOKENS.contains(&token) || token.contains("test"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Testing,
    TestingLike,
    Semantic,
    Structural,
    Text,
    Position,
    Done,
}

/// Lazily produced candidates for a snapshot chain, in tier order.
///
/// Each stage is only computed once the previous one is exhausted, so a
/// resolver that accepts the first candidate never builds the rest.
pub struct RankedCandidates<'a> {
    chain: &'a SnapshotChain,
    policy: &'a SelectorPolicy,
    blacklist: &'a Blacklist,
    stage: Stage,
    cursor: usize,
}

pub fn rank_candidates<'a>(
    chain: &'a SnapshotChain,
    policy: &'a SelectorPolicy,
    blacklist: &'a Blacklist,
) -> RankedCandidates<'a> {
    RankedCandidates {
        chain,
        policy,
        blacklist,
        stage: Stage::Testing,
        cursor: 0,
    }
}

impl RankedCandidates<'_> {
    fn advance(&mut self, stage: Stage) {
        self.stage = stage;
        self.cursor = 0;
    }

    fn blocked(&self, tag: &str, attribute: &str, value: &str) -> bool {
        self.blacklist.contains(tag, attribute, value)
    }

    fn attribute_candidate(&self, tier: Tier, name: &str) -> Option<LocatorCandidate> {
        let node = self.chain.target();
        let value = node.attribute(name)?;
        if tier == Tier::SemanticAttr && !is_semantic_with(value, self.policy) {
            return None;
        }
        if self.blocked(&node.tag, name, value) {
            return None;
        }
        Some(LocatorCandidate::from_component(
            tier,
            xpath::attribute_step(&node.tag, name, value),
            BlacklistEntry::new(&node.tag, name, value),
        ))
    }
}

impl Iterator for RankedCandidates<'_> {
    type Item = LocatorCandidate;

    fn next(&mut self) -> Option<LocatorCandidate> {
        let (chain, policy) = (self.chain, self.policy);
        let node = chain.target();
        loop {
            match self.stage {
                Stage::Testing => {
                    let Some(name) = policy.testing_attributes.get(self.cursor) else {
                        self.advance(Stage::TestingLike);
                        continue;
                    };
                    self.cursor += 1;
                    if let Some(candidate) = self.attribute_candidate(Tier::TestingAttr, name) {
                        return Some(candidate);
                    }
                }
                Stage::TestingLike => {
                    let Some((name, _)) = node.attributes.get(self.cursor) else {
                        self.advance(Stage::Semantic);
                        continue;
                    };
                    self.cursor += 1;
                    if is_testing_like(name, policy)
                        && let Some(candidate) = self.attribute_candidate(Tier::TestingAttr, name)
                    {
                        return Some(candidate);
                    }
                }
                Stage::Semantic => {
                    let Some(name) = policy.semantic_attributes.get(self.cursor) else {
                        self.advance(Stage::Structural);
                        continue;
                    };
                    self.cursor += 1;
                    if let Some(candidate) = self.attribute_candidate(Tier::SemanticAttr, name) {
                        return Some(candidate);
                    }
                }
                Stage::Structural => {
                    let Some(class) = node.classes().nth(self.cursor) else {
                        self.advance(Stage::Text);
                        continue;
                    };
                    self.cursor += 1;
                    if is_semantic_with(class, policy) && !self.blocked(&node.tag, "class", class)
                    {
                        return Some(LocatorCandidate::from_component(
                            Tier::Structural,
                            xpath::class_step(&node.tag, class),
                            BlacklistEntry::new(&node.tag, "class", class),
                        ));
                    }
                }
                Stage::Text => {
                    self.advance(Stage::Position);
                    if !policy.text_tags.iter().any(|t| *t == node.tag)
                        || !is_stable_text(&node.text, policy)
                    {
                        continue;
                    }
                    let text = normalize_whitespace(&node.text);
                    if self.blocked(&node.tag, "text", &text) {
                        continue;
                    }
                    return Some(LocatorCandidate::from_component(
                        Tier::Text,
                        xpath::text_step(&node.tag, &text),
                        BlacklistEntry::new(&node.tag, "text", text),
                    ));
                }
                Stage::Position => {
                    self.advance(Stage::Done);
                    return Some(LocatorCandidate {
                        expression: position_expression(chain, policy, self.blacklist),
                        tier: Tier::Position,
                        widened: false,
                        brittle: true,
                        source: None,
                    });
                }
                Stage::Done => return None,
            }
        }
    }
}

/// Selector for an ancestor used to scope a descendant expression.
///
/// Only tier 1 and tier 2 attributes qualify; class tokens and text are too
/// volatile to anchor on.
pub fn anchor_selector(
    node: &ElementNode,
    policy: &SelectorPolicy,
    blacklist: &Blacklist,
) -> Option<String> {
    let testing = policy
        .testing_attributes
        .iter()
        .map(String::as_str)
        .chain(
            node.attributes
                .iter()
                .map(|(n, _)| n.as_str())
                .filter(|n| is_testing_like(n, policy)),
        )
        .find_map(|name| node.attribute(name).map(|v| (name, v)));

    let semantic = || {
        policy.semantic_attributes.iter().find_map(|name| {
            node.attribute(name)
                .filter(|v| is_semantic_with(v, policy))
                .map(|v| (name.as_str(), v))
        })
    };

    testing
        .filter(|(name, value)| !blacklist.contains(&node.tag, name, value))
        .or_else(semantic)
        .filter(|(name, value)| !blacklist.contains(&node.tag, name, value))
        .map(|(name, value)| xpath::attribute_step(&node.tag, name, value))
}

/// Positional path from the nearest anchorable ancestor down to the target.
///
/// Without any anchor the path is absolute when the chain reaches `<html>`
/// and document-relative otherwise.
pub fn position_expression(
    chain: &SnapshotChain,
    policy: &SelectorPolicy,
    blacklist: &Blacklist,
) -> String {
    let mut steps: Vec<String> = Vec::new();
    for (index, node) in chain.nodes().iter().enumerate() {
        if index > 0
            && let Some(anchor) = anchor_selector(node, policy, blacklist)
        {
            steps.reverse();
            return format!("{}/{}", anchor, steps.join("/"));
        }
        let tag = xpath::name_test(&node.tag);
        steps.push(match node.position {
            Some(position) => format!("{}[{}]", tag, position),
            None => tag.to_string(),
        });
    }

    steps.reverse();
    let rooted = chain.nodes().last().is_some_and(|n| n.tag == "html");
    if rooted {
        format!("/{}", steps.join("/"))
    } else {
        format!("//{}", steps.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_like_attribute_names() {
        let policy = SelectorPolicy::default();
        assert!(is_testing_like("data-e2e", &policy));
        assert!(is_testing_like("data-test-id", &policy));
        assert!(!is_testing_like("data-policy", &policy));
        assert!(!is_testing_like("data-testid", &policy));
    }

    #[test]
    fn position_path_anchors_on_stable_ancestor() {
        let chain = SnapshotChain::new(ElementNode::new("input").at_position(1))
            .with_parent(ElementNode::new("div").at_position(2))
            .with_parent(ElementNode::new("form").attr("id", "login"));
        let expr = position_expression(&chain, &SelectorPolicy::default(), &Blacklist::new());
        assert_eq!(expr, "//form[@id=\"login\"]/div[2]/input[1]");
    }
}
