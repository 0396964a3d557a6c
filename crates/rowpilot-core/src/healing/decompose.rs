use regex::Regex;
use std::sync::LazyLock;

use crate::selector::blacklist::BlacklistEntry;
use crate::selector::xpath;

// A quoted XPath literal. Group 1 is double-quoted content, group 2 single.
const LITERAL: &str = r#"(?:"([^"]*)"|'([^']*)')"#;

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^@([A-Za-z_][\w:.-]*)\s*=\s*{}$", LITERAL)).unwrap()
});

static PADDED_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^contains\(\s*concat\(\s*' '\s*,\s*normalize-space\(\s*@class\s*\)\s*,\s*' '\s*\)\s*,\s*{}\s*\)$",
        LITERAL
    ))
    .unwrap()
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^contains\(\s*@class\s*,\s*{}\s*\)$", LITERAL)).unwrap()
});

static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:normalize-space\(\s*\.?\s*\)|text\(\)|\.)\s*=\s*{}$",
        LITERAL
    ))
    .unwrap()
});

static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentTest {
    Attribute { name: String, value: String },
    Class(String),
    Text(String),
    Position(usize),
}

/// One predicate of one location step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorComponent {
    pub tag: String,
    pub test: ComponentTest,
}

impl SelectorComponent {
    /// Standalone expression that checks this component alone. Positions
    /// mean nothing out of context and have none.
    pub fn standalone(&self) -> Option<String> {
        match &self.test {
            ComponentTest::Attribute { name, value } => {
                Some(xpath::attribute_step(&self.tag, name, value))
            }
            ComponentTest::Class(class) => Some(xpath::class_step(&self.tag, class)),
            ComponentTest::Text(text) => Some(xpath::text_step(&self.tag, text)),
            ComponentTest::Position(_) => None,
        }
    }

    pub fn blacklist_entry(&self) -> Option<BlacklistEntry> {
        let (attribute, value) = match &self.test {
            ComponentTest::Attribute { name, value } => (name.as_str(), value.as_str()),
            ComponentTest::Class(class) => ("class", class.as_str()),
            ComponentTest::Text(text) => ("text", text.as_str()),
            ComponentTest::Position(_) => return None,
        };
        Some(BlacklistEntry::new(&self.tag, attribute, value))
    }
}

/// Split an XPath selector into per-step predicate components.
///
/// Predicates this parser does not understand (functions over several
/// attributes, `concat()` literals, boolean operators) are skipped, which
/// leaves them out of the blame.
pub fn decompose(selector: &str) -> Vec<SelectorComponent> {
    let mut components = Vec::new();
    for step in split_steps(selector) {
        let (tag, predicates) = split_predicates(step);
        let tag = tag.trim();
        if tag.is_empty() || tag.contains("::") {
            continue;
        }
        for predicate in predicates {
            if let Some(test) = parse_predicate(predicate.trim()) {
                components.push(SelectorComponent {
                    tag: tag.to_string(),
                    test,
                });
            }
        }
    }
    components
}

fn parse_predicate(predicate: &str) -> Option<ComponentTest> {
    let literal = |caps: &regex::Captures, first: usize| {
        caps.get(first)
            .or_else(|| caps.get(first + 1))
            .map(|m| m.as_str().to_string())
    };

    if let Some(caps) = ATTRIBUTE_RE.captures(predicate) {
        return Some(ComponentTest::Attribute {
            name: caps[1].to_string(),
            value: literal(&caps, 2)?,
        });
    }
    if let Some(caps) = PADDED_CLASS_RE.captures(predicate) {
        return Some(ComponentTest::Class(literal(&caps, 1)?.trim().to_string()));
    }
    if let Some(caps) = CLASS_RE.captures(predicate) {
        return Some(ComponentTest::Class(literal(&caps, 1)?.trim().to_string()));
    }
    if let Some(caps) = TEXT_RE.captures(predicate) {
        return Some(ComponentTest::Text(literal(&caps, 1)?));
    }
    if let Some(caps) = POSITION_RE.captures(predicate) {
        return caps[1].parse().ok().map(ComponentTest::Position);
    }
    None
}

/// Location steps of `selector`, ignoring `/` inside predicates and quotes.
fn split_steps(selector: &str) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                if i > start {
                    steps.push(&selector[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < selector.len() {
        steps.push(&selector[start..]);
    }
    steps
}

/// Name test and bracketed predicate bodies of one step.
fn split_predicates(step: &str) -> (&str, Vec<&str>) {
    let Some(open) = step.find('[') else {
        return (step, Vec::new());
    };

    let mut predicates = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut body_start = 0;

    for (i, c) in step.char_indices().skip_while(|(i, _)| *i < open) {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => {
                if depth == 0 {
                    body_start = i + 1;
                }
                depth += 1;
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    predicates.push(&step[body_start..i]);
                }
            }
            _ => {}
        }
    }
    (&step[..open], predicates)
}
