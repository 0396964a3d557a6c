use crate::selector::blacklist::{Blacklist, BlacklistEntry};
use crate::selector::query::{DocumentQuery, QueryError};

use super::decompose::{SelectorComponent, decompose};

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    /// These components no longer match anything on the page.
    Blamed(Vec<BlacklistEntry>),
    /// The failure cannot be pinned on individual components.
    Unattributed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureAnalysis {
    pub selector: String,
    pub components: Vec<SelectorComponent>,
    pub diagnosis: Diagnosis,
}

impl FailureAnalysis {
    pub fn blamed(&self) -> &[BlacklistEntry] {
        match &self.diagnosis {
            Diagnosis::Blamed(entries) => entries,
            Diagnosis::Unattributed { .. } => &[],
        }
    }

    /// Human-readable explanation shown before asking for a re-pick.
    pub fn summary(&self) -> String {
        match &self.diagnosis {
            Diagnosis::Blamed(entries) => entries
                .iter()
                .map(|e| format!("{} no longer matches", e))
                .collect::<Vec<_>>()
                .join("; "),
            Diagnosis::Unattributed { reason } => reason.clone(),
        }
    }

    /// Record blamed components. Returns how many were new.
    pub fn apply_to(&self, blacklist: &mut Blacklist) -> usize {
        self.blamed()
            .iter()
            .filter(|entry| blacklist.insert((*entry).clone()))
            .count()
    }
}

/// Query each component of a selector that stopped matching on its own.
///
/// Components are only blamed when some of them still match: if every
/// component of a multi-component selector comes back empty, the page most
/// likely is not the one the selector was made for, and blacklisting all of
/// them would poison later picks.
pub async fn analyze_failure<Q>(
    selector: &str,
    query: &mut Q,
) -> Result<FailureAnalysis, QueryError>
where
    Q: DocumentQuery + ?Sized,
{
    let components = decompose(selector);

    let mut checked = 0usize;
    let mut failing = Vec::new();
    for component in &components {
        let (Some(expression), Some(entry)) = (component.standalone(), component.blacklist_entry())
        else {
            continue;
        };
        match query.query(&expression).await {
            Ok(matches) => {
                checked += 1;
                if matches.count == 0 && !failing.contains(&entry) {
                    failing.push(entry);
                }
            }
            Err(QueryError::InvalidSelector(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let diagnosis = if checked == 0 {
        Diagnosis::Unattributed {
            reason: format!("Selector {} has no components that can be checked", selector),
        }
    } else if failing.is_empty() {
        Diagnosis::Unattributed {
            reason: "Every part of the selector still matches; the element moved or its \
                     combination changed"
                .to_string(),
        }
    } else if checked > 1 && failing.len() == checked {
        Diagnosis::Unattributed {
            reason: "No part of the selector matches any more; the page layout changed".to_string(),
        }
    } else {
        Diagnosis::Blamed(failing)
    };

    Ok(FailureAnalysis {
        selector: selector.to_string(),
        components,
        diagnosis,
    })
}
