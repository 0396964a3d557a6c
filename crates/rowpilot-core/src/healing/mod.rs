//! Diagnosis of saved selectors that stopped matching.
//!
//! A failing selector is split into its components, each component is queried
//! on its own, and the ones that no longer match anything are blamed and
//! blacklisted so the next selector generation avoids them.

mod analyzer;
mod decompose;

pub use analyzer::{Diagnosis, FailureAnalysis, analyze_failure};
pub use decompose::{ComponentTest, SelectorComponent, decompose};
