use serde::{Deserialize, Serialize};

use super::uniqueness::SelectorError;

/// One element of a picked chain, as captured by the picker overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementNode {
    pub tag: String,
    /// Attributes in document order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default)]
    pub text: String,
    /// 1-based index among siblings that share the tag.
    #[serde(default)]
    pub position: Option<usize>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            position: None,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Attribute value, treating a whitespace-only value as absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Class tokens in attribute order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .into_iter()
            .flat_map(str::split_whitespace)
    }
}

/// A picked element followed by its ancestors, nearest first.
///
/// Index 0 is the target, index `i + 1` is the parent of index `i`. The
/// chain never borrows from the live document so it can be kept across
/// navigations and replayed against tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ElementNode>", into = "Vec<ElementNode>")]
pub struct SnapshotChain {
    nodes: Vec<ElementNode>,
}

impl SnapshotChain {
    pub fn new(target: ElementNode) -> Self {
        Self {
            nodes: vec![target],
        }
    }

    pub fn from_nodes(nodes: Vec<ElementNode>) -> Result<Self, SelectorError> {
        if nodes.is_empty() {
            return Err(SelectorError::EmptySnapshot);
        }
        Ok(Self { nodes })
    }

    /// Append the next ancestor (the parent of the current outermost node).
    pub fn with_parent(mut self, parent: ElementNode) -> Self {
        self.nodes.push(parent);
        self
    }

    pub fn target(&self) -> &ElementNode {
        &self.nodes[0]
    }

    pub fn node(&self, index: usize) -> Option<&ElementNode> {
        self.nodes.get(index)
    }

    pub fn parent_index(&self, index: usize) -> Option<usize> {
        let parent = index + 1;
        (parent < self.nodes.len()).then_some(parent)
    }

    /// Ancestors of the target, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ElementNode> {
        self.nodes.iter().skip(1)
    }

    pub fn nodes(&self) -> &[ElementNode] {
        &self.nodes
    }

    /// Number of captured nodes, target included. Never zero.
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }
}

impl TryFrom<Vec<ElementNode>> for SnapshotChain {
    type Error = SelectorError;

    fn try_from(nodes: Vec<ElementNode>) -> Result<Self, Self::Error> {
        Self::from_nodes(nodes)
    }
}

impl From<SnapshotChain> for Vec<ElementNode> {
    fn from(chain: SnapshotChain) -> Self {
        chain.nodes
    }
}
