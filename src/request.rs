//! Run requests: the host's per-suite discovery/execution directives.

use crate::selector::Selector;

/// How a suite's runnable-ness was recognized by the host. Determines which
/// construction strategy the loader collaborator uses, and is echoed back on
/// every status event as the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityMarker {
    /// The suite is identified by an inheritance-like relation.
    Subclass { requires_no_arg_constructor: bool },
    /// The suite is produced by wrapping an arbitrary class via an
    /// annotation-like marker.
    Wrapped,
}

/// A single suite's run directive. Immutable once created; the host collapses
/// duplicate requests for the same class before the engine sees them.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub qualified_name: String,
    pub marker: CapabilityMarker,
    /// Whether the suite was named explicitly (as opposed to picked up by
    /// ambient discovery). Controls discovery-exemption pruning and whether
    /// resolution failures are fatal.
    pub explicitly_specified: bool,
    /// Selectors narrowing which tests run. Logically OR'd; an empty list
    /// means the entire suite, subject to discovery rules.
    pub selectors: Vec<Selector>,
}

impl RunRequest {
    pub fn new(
        qualified_name: impl Into<String>,
        marker: CapabilityMarker,
        explicitly_specified: bool,
        selectors: Vec<Selector>,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            marker,
            explicitly_specified,
            selectors,
        }
    }

    /// The package portion of the qualified name, empty for unpackaged suites.
    pub fn package(&self) -> &str {
        match self.qualified_name.rfind('.') {
            Some(idx) => &self.qualified_name[..idx],
            None => "",
        }
    }
}
