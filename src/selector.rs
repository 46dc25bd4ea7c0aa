//! Selector resolution: from one run request to the ordered, deduplicated
//! set of concrete executable units.

use std::collections::BTreeSet;

use crate::config::Configuration;
use crate::request::RunRequest;
use crate::suite::{effective_tags, Suite};

/// A filter narrowing which tests within a suite (or one of its nested
/// suites) run. Selectors within one request are logically OR'd; they never
/// subtract from each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// All top-level tests of the named suite.
    EntireSuite,
    /// The top-level test with this exact name. No match is not an error.
    SingleTest { name: String },
    /// Every top-level test whose name contains this substring. Substring,
    /// not glob or regex.
    WildcardTest { substring: String },
    /// Every test inside the named nested suite, run as part of the owning
    /// task.
    NestedSuite { suite_id: String },
    /// A single test inside the named nested suite.
    NestedTest {
        suite_id: String,
        test_name: String,
    },
}

/// One concrete executable unit. `nested` is the containing nested suite's
/// id, or `None` for a top-level test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedUnit {
    pub nested: Option<String>,
    pub test: String,
}

impl ResolvedUnit {
    pub fn top_level(test: impl Into<String>) -> Self {
        Self {
            nested: None,
            test: test.into(),
        }
    }

    pub fn in_nested(suite_id: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            nested: Some(suite_id.into()),
            test: test.into(),
        }
    }
}

/// The resolver's output: units in execution order (nested suites in declared
/// order, each suite's tests in declared order, then top-level tests), with a
/// flag recording that no selector narrowing was requested.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedUnits {
    pub entire_suite: bool,
    pub units: Vec<ResolvedUnit>,
}

impl ResolvedUnits {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Resolve a run request against the constructed suite hierarchy.
///
/// `discovery_exempt` is the suite's class-level exemption marker, checked
/// first: an exempt suite contributes nothing unless explicitly specified.
/// Configuration tag and test-name filters are applied to every matched unit,
/// so a filtered-out test never reaches execution at all.
pub fn resolve(
    request: &RunRequest,
    suite: &dyn Suite,
    discovery_exempt: bool,
    config: &Configuration,
) -> ResolvedUnits {
    if discovery_exempt && !request.explicitly_specified {
        tracing::debug!(suite = suite.id(), "discovery-exempt suite pruned");
        return ResolvedUnits::empty();
    }

    let top_names = suite.test_names();
    let nested_suites = suite.nested();

    let entire_suite = request.selectors.is_empty();
    let mut top_selected: BTreeSet<String> = BTreeSet::new();
    // Selected tests per nested suite, keyed by position to keep declared order.
    let mut nested_selected: Vec<BTreeSet<String>> =
        nested_suites.iter().map(|_| BTreeSet::new()).collect();

    if entire_suite {
        top_selected.extend(top_names.iter().cloned());
        for (idx, nested) in nested_suites.iter().enumerate() {
            nested_selected[idx].extend(nested.test_names());
        }
    } else {
        for selector in &request.selectors {
            match selector {
                Selector::EntireSuite => {
                    top_selected.extend(top_names.iter().cloned());
                }
                Selector::SingleTest { name } => {
                    if top_names.iter().any(|t| t == name) {
                        top_selected.insert(name.clone());
                    }
                }
                Selector::WildcardTest { substring } => {
                    top_selected.extend(
                        top_names
                            .iter()
                            .filter(|t| t.contains(substring.as_str()))
                            .cloned(),
                    );
                }
                Selector::NestedSuite { suite_id } => {
                    if let Some(idx) = nested_suites.iter().position(|n| n.id() == suite_id) {
                        nested_selected[idx].extend(nested_suites[idx].test_names());
                    }
                }
                Selector::NestedTest {
                    suite_id,
                    test_name,
                } => {
                    if let Some(idx) = nested_suites.iter().position(|n| n.id() == suite_id) {
                        if nested_suites[idx].test_names().iter().any(|t| t == test_name) {
                            nested_selected[idx].insert(test_name.clone());
                        }
                    }
                }
            }
        }
    }

    // Materialize in execution order, applying the configuration filters.
    let mut units = Vec::new();
    for (idx, nested) in nested_suites.iter().enumerate() {
        for test in nested.test_names() {
            if !nested_selected[idx].contains(&test) {
                continue;
            }
            if !config.test_name_allowed(&test) {
                continue;
            }
            if !config.tags_allowed(&effective_tags(nested.as_ref(), &test)) {
                continue;
            }
            units.push(ResolvedUnit::in_nested(nested.id(), test));
        }
    }
    for test in &top_names {
        if !top_selected.contains(test) {
            continue;
        }
        if !config.test_name_allowed(test) {
            continue;
        }
        if !config.tags_allowed(&effective_tags(suite, test)) {
            continue;
        }
        units.push(ResolvedUnit::top_level(test.clone()));
    }

    tracing::debug!(
        suite = suite.id(),
        units = units.len(),
        entire_suite,
        "request resolved"
    );
    ResolvedUnits {
        entire_suite,
        units,
    }
}
