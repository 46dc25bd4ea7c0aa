//! The interface boundary to the suite-authoring model.
//!
//! The engine never defines how a suite enumerates or runs its tests; it only
//! requires the [`Suite`] trait below. Reflective construction of suite
//! instances from a qualified name is likewise external: hosts hand the engine
//! a [`SuiteRegistry`] mapping qualified names to construction strategies.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::request::CapabilityMarker;

/// Description of a throwable carried by a failed, errored, canceled, or
/// aborted unit of work: a one-line message plus optional detail lines
/// (typically a rendered backtrace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub message: String,
    pub detail: Vec<String>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Vec::new(),
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: Vec<String>) -> Self {
        Self {
            message: message.into(),
            detail,
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FailureDetail {}

/// Terminal outcome of one test body. One test run produces exactly one
/// verdict; there are no transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Assertion-style failure.
    Failed(FailureDetail),
    /// Unexpected exception during the test.
    Errored(FailureDetail),
    /// Explicit skip, with a reason.
    Skipped(String),
    /// The test carries an ignored marker and was never run.
    Ignored,
    /// Incomplete-implementation marker.
    Pending,
    /// Cooperative abort of the test.
    Canceled(FailureDetail),
}

/// What running one test produced. `duration_ms` is measured by the suite;
/// the engine forces it to -1 on translation for ignored tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub verdict: Verdict,
    pub duration_ms: u64,
}

impl TestOutcome {
    pub fn new(verdict: Verdict, duration_ms: u64) -> Self {
        Self {
            verdict,
            duration_ms,
        }
    }

    pub fn passed(duration_ms: u64) -> Self {
        Self::new(Verdict::Passed, duration_ms)
    }
}

/// A runnable body of tests, possibly containing nested suites.
///
/// Ordering is load-bearing everywhere: `test_names` and `nested` must return
/// declared order, and the engine preserves it through resolution and
/// execution.
pub trait Suite: Send + Sync {
    /// Qualified name identifying this suite.
    fn id(&self) -> &str;

    /// Top-level test names in declared order. Nested suites' tests are not
    /// included here.
    fn test_names(&self) -> Vec<String>;

    /// Directly nested suites in declared order.
    fn nested(&self) -> Vec<Arc<dyn Suite>> {
        Vec::new()
    }

    /// Suite-level tags, applied to every test in this suite.
    fn suite_tags(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Tags carried by one test, not counting suite-level tags.
    fn test_tags(&self, _test: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// One-time hook run before any selected test of this suite.
    fn setup(&self) -> Result<(), FailureDetail> {
        Ok(())
    }

    /// One-time hook run after the selected tests, even when some failed.
    fn teardown(&self) -> Result<(), FailureDetail> {
        Ok(())
    }

    /// Run a single test to completion and report its outcome. Must not panic
    /// for unknown names; return an errored outcome instead.
    fn run_test(&self, name: &str) -> TestOutcome;
}

/// The effective tag set of one test: its own tags plus its containing
/// suite's.
pub fn effective_tags(suite: &dyn Suite, test: &str) -> BTreeSet<String> {
    let mut tags = suite.suite_tags();
    tags.extend(suite.test_tags(test));
    tags
}

/// Which runnable-ness relation a registered class satisfies. Closed set,
/// mirrored by [`CapabilityMarker`] on the request side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    /// Identified by an inheritance-like relation; constructible directly.
    Subclass,
    /// Produced by wrapping an arbitrary class via an annotation-like marker.
    Wrapped,
}

impl SuiteKind {
    /// Capability lookup: does a request marker recognize this kind?
    pub fn satisfies(self, marker: CapabilityMarker) -> bool {
        matches!(
            (self, marker),
            (SuiteKind::Subclass, CapabilityMarker::Subclass { .. })
                | (SuiteKind::Wrapped, CapabilityMarker::Wrapped)
        )
    }
}

type SuiteFactory = dyn Fn() -> Result<Arc<dyn Suite>, FailureDetail> + Send + Sync;

/// How one qualified name can be turned into a suite instance, plus the
/// class-level metadata the engine needs before construction.
pub struct Registration {
    kind: SuiteKind,
    discovery_exempt: bool,
    tags: BTreeSet<String>,
    factory: Box<SuiteFactory>,
}

impl Registration {
    pub fn new<F>(kind: SuiteKind, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Suite>, FailureDetail> + Send + Sync + 'static,
    {
        Self {
            kind,
            discovery_exempt: false,
            tags: BTreeSet::new(),
            factory: Box::new(factory),
        }
    }

    /// Mark the suite as excluded from ambient discovery. Such a suite only
    /// ever runs when its request is explicitly specified.
    pub fn discovery_exempt(mut self) -> Self {
        self.discovery_exempt = true;
        self
    }

    /// Class-level tag markers, including inherited ones.
    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// The loader collaborator: qualified name to construction strategy.
#[derive(Default)]
pub struct SuiteRegistry {
    entries: BTreeMap<String, Registration>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, qualified_name: impl Into<String>, registration: Registration) {
        self.entries.insert(qualified_name.into(), registration);
    }

    pub fn kind_of(&self, qualified_name: &str) -> Option<SuiteKind> {
        self.entries.get(qualified_name).map(|e| e.kind)
    }

    pub fn is_discovery_exempt(&self, qualified_name: &str) -> bool {
        self.entries
            .get(qualified_name)
            .map(|e| e.discovery_exempt)
            .unwrap_or(false)
    }

    pub fn tags_of(&self, qualified_name: &str) -> BTreeSet<String> {
        self.entries
            .get(qualified_name)
            .map(|e| e.tags.clone())
            .unwrap_or_default()
    }

    /// Construct the suite. `None` when the name is not registered.
    pub fn construct(&self, qualified_name: &str) -> Option<Result<Arc<dyn Suite>, FailureDetail>> {
        self.entries.get(qualified_name).map(|e| (e.factory)())
    }
}
