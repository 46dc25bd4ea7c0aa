//! Shared fixtures for the integration suites: scripted in-memory suites,
//! collecting sinks, and registry helpers.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Once};

use pariksha::events::{EventSink, LogSink, StatusEvent};
use pariksha::request::{CapabilityMarker, RunRequest};
use pariksha::selector::Selector;
use pariksha::suite::{
    FailureDetail, Registration, Suite, SuiteKind, SuiteRegistry, TestOutcome, Verdict,
};

static TRACING: Once = Once::new();

/// Install a fmt subscriber once so engine tracing lands in captured test
/// output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub struct ScriptedTest {
    pub name: String,
    pub tags: BTreeSet<String>,
    pub outcome: TestOutcome,
}

/// A suite whose tests are fully scripted up front, in declared order.
pub struct StaticSuite {
    id: String,
    tests: Vec<ScriptedTest>,
    nested: Vec<Arc<StaticSuite>>,
    suite_tags: BTreeSet<String>,
    fail_setup: Option<FailureDetail>,
    fail_teardown: Option<FailureDetail>,
}

impl StaticSuite {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tests: Vec::new(),
            nested: Vec::new(),
            suite_tags: BTreeSet::new(),
            fail_setup: None,
            fail_teardown: None,
        }
    }

    pub fn passing(self, name: &str) -> Self {
        self.test(name, Verdict::Passed, 1)
    }

    pub fn test(mut self, name: &str, verdict: Verdict, duration_ms: u64) -> Self {
        self.tests.push(ScriptedTest {
            name: name.to_string(),
            tags: BTreeSet::new(),
            outcome: TestOutcome::new(verdict, duration_ms),
        });
        self
    }

    pub fn tagged_test(mut self, name: &str, verdict: Verdict, tags: &[&str]) -> Self {
        self.tests.push(ScriptedTest {
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            outcome: TestOutcome::new(verdict, 1),
        });
        self
    }

    pub fn with_nested(mut self, nested: StaticSuite) -> Self {
        self.nested.push(Arc::new(nested));
        self
    }

    pub fn suite_tag(mut self, tag: &str) -> Self {
        self.suite_tags.insert(tag.to_string());
        self
    }

    pub fn failing_setup(mut self, message: &str) -> Self {
        self.fail_setup = Some(FailureDetail::new(message));
        self
    }

    pub fn failing_teardown(mut self, message: &str) -> Self {
        self.fail_teardown = Some(FailureDetail::new(message));
        self
    }
}

impl Suite for StaticSuite {
    fn id(&self) -> &str {
        &self.id
    }

    fn test_names(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.name.clone()).collect()
    }

    fn nested(&self) -> Vec<Arc<dyn Suite>> {
        self.nested
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn Suite>)
            .collect()
    }

    fn suite_tags(&self) -> BTreeSet<String> {
        self.suite_tags.clone()
    }

    fn test_tags(&self, test: &str) -> BTreeSet<String> {
        self.tests
            .iter()
            .find(|t| t.name == test)
            .map(|t| t.tags.clone())
            .unwrap_or_default()
    }

    fn setup(&self) -> Result<(), FailureDetail> {
        match &self.fail_setup {
            Some(detail) => Err(detail.clone()),
            None => Ok(()),
        }
    }

    fn teardown(&self) -> Result<(), FailureDetail> {
        match &self.fail_teardown {
            Some(detail) => Err(detail.clone()),
            None => Ok(()),
        }
    }

    fn run_test(&self, name: &str) -> TestOutcome {
        match self.tests.iter().find(|t| t.name == name) {
            Some(test) => test.outcome.clone(),
            None => TestOutcome::new(
                Verdict::Errored(FailureDetail::new(format!("no such test: {name}"))),
                0,
            ),
        }
    }
}

/// Register constructible suites. Each suite is built once and cloned out of
/// the factory, which is enough for scripted fixtures.
pub fn registry_of(suites: Vec<(StaticSuite, SuiteKind)>) -> SuiteRegistry {
    init_tracing();
    let mut registry = SuiteRegistry::new();
    for (suite, kind) in suites {
        let name = suite.id().to_string();
        let shared: Arc<dyn Suite> = Arc::new(suite);
        registry.insert(
            name,
            Registration::new(kind, move || Ok(Arc::clone(&shared))),
        );
    }
    registry
}

pub fn register_shared(registry: &mut SuiteRegistry, suite: StaticSuite, kind: SuiteKind) {
    init_tracing();
    let name = suite.id().to_string();
    let shared: Arc<dyn Suite> = Arc::new(suite);
    registry.insert(
        name,
        Registration::new(kind, move || Ok(Arc::clone(&shared))),
    );
}

pub fn register_broken(registry: &mut SuiteRegistry, name: &str, kind: SuiteKind, message: &str) {
    init_tracing();
    let message = message.to_string();
    registry.insert(
        name,
        Registration::new(kind, move || Err(FailureDetail::new(message.clone()))),
    );
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn handle(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct CollectingLog {
    lines: Mutex<Vec<String>>,
}

impl CollectingLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for CollectingLog {
    fn info(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn error(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

pub struct NullLog;

impl LogSink for NullLog {
    fn info(&self, _line: &str) {}
    fn error(&self, _line: &str) {}
}

pub const SUBCLASS: CapabilityMarker = CapabilityMarker::Subclass {
    requires_no_arg_constructor: true,
};

pub fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

pub fn ambient(name: &str) -> RunRequest {
    RunRequest::new(name, SUBCLASS, false, vec![])
}

pub fn explicit(name: &str, selectors: Vec<Selector>) -> RunRequest {
    RunRequest::new(name, SUBCLASS, true, selectors)
}

/// A suite with three passing top-level tests, in declared order.
pub fn sample_suite() -> StaticSuite {
    StaticSuite::new("demo.SampleSuite")
        .passing("test 1")
        .passing("test 2")
        .passing("test 3")
}
