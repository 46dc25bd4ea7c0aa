//! The generic status-event protocol understood by the host, and the
//! translation from internal suite/test lifecycle outcomes into it.

use crate::request::CapabilityMarker;
use crate::suite::{FailureDetail, TestOutcome, Verdict};

/// Terminal status of one unit of work. One event carries exactly one status;
/// there are no transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    /// Unexpected exception during a test, or a suite-level abort.
    Error,
    /// Assertion-style failure.
    Failure,
    Skipped,
    Ignored,
    Pending,
    Canceled,
}

/// Describes the event's target. The host distinguishes nested from
/// top-level events purely from this shape, never from a separate flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    /// The top-level suite itself (suite-level aborts).
    Suite,
    /// A top-level test.
    Test { name: String },
    /// A nested suite itself.
    NestedSuite { suite_id: String },
    /// A test inside a nested suite.
    NestedTest {
        suite_id: String,
        test_name: String,
    },
}

/// One host-facing status event. `duration_ms == -1` is reserved exclusively
/// for [`Status::Ignored`]; every other status carries a real duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: Status,
    pub fully_qualified_name: String,
    pub fingerprint: CapabilityMarker,
    pub duration_ms: i64,
    pub throwable: Option<FailureDetail>,
    pub selector: EventSelector,
}

/// Where the host receives translated status events.
pub trait EventSink: Send + Sync {
    fn handle(&self, event: StatusEvent);
}

/// Where the engine writes human-readable progress lines.
pub trait LogSink: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
}

/// Translate one test outcome into the host's status-event shape.
///
/// `nested` carries the containing nested suite's id when the outcome
/// originated inside a nested suite, which switches the selector shape.
pub fn translate(
    fully_qualified_name: &str,
    fingerprint: CapabilityMarker,
    nested: Option<&str>,
    test_name: &str,
    outcome: &TestOutcome,
) -> StatusEvent {
    let (status, throwable) = match &outcome.verdict {
        Verdict::Passed => (Status::Success, None),
        Verdict::Failed(detail) => (Status::Failure, Some(detail.clone())),
        Verdict::Errored(detail) => (Status::Error, Some(detail.clone())),
        Verdict::Skipped(reason) => (Status::Skipped, Some(FailureDetail::new(reason.clone()))),
        Verdict::Ignored => (Status::Ignored, None),
        Verdict::Pending => (Status::Pending, None),
        Verdict::Canceled(detail) => (Status::Canceled, Some(detail.clone())),
    };
    let duration_ms = if status == Status::Ignored {
        -1
    } else {
        outcome.duration_ms as i64
    };
    let selector = match nested {
        Some(suite_id) => EventSelector::NestedTest {
            suite_id: suite_id.to_string(),
            test_name: test_name.to_string(),
        },
        None => EventSelector::Test {
            name: test_name.to_string(),
        },
    };
    StatusEvent {
        status,
        fully_qualified_name: fully_qualified_name.to_string(),
        fingerprint,
        duration_ms,
        throwable,
        selector,
    }
}

/// Build the suite-aborted event for a top-level or nested suite.
pub fn suite_aborted(
    fully_qualified_name: &str,
    fingerprint: CapabilityMarker,
    nested: Option<&str>,
    detail: FailureDetail,
) -> StatusEvent {
    let selector = match nested {
        Some(suite_id) => EventSelector::NestedSuite {
            suite_id: suite_id.to_string(),
        },
        None => EventSelector::Suite,
    };
    StatusEvent {
        status: Status::Error,
        fully_qualified_name: fully_qualified_name.to_string(),
        fingerprint,
        duration_ms: 0,
        throwable: Some(detail),
        selector,
    }
}

impl EventSelector {
    /// Whether this selector names a test (as opposed to a whole suite).
    pub fn is_test(&self) -> bool {
        matches!(
            self,
            EventSelector::Test { .. } | EventSelector::NestedTest { .. }
        )
    }

    /// The test name, when this selector names a test.
    pub fn test_name(&self) -> Option<&str> {
        match self {
            EventSelector::Test { name } => Some(name),
            EventSelector::NestedTest { test_name, .. } => Some(test_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: CapabilityMarker = CapabilityMarker::Wrapped;

    #[test]
    fn verdicts_map_to_their_statuses() {
        let cases = vec![
            (Verdict::Passed, Status::Success),
            (
                Verdict::Failed(FailureDetail::new("assert")),
                Status::Failure,
            ),
            (Verdict::Errored(FailureDetail::new("boom")), Status::Error),
            (Verdict::Skipped("later".into()), Status::Skipped),
            (Verdict::Pending, Status::Pending),
            (
                Verdict::Canceled(FailureDetail::new("db down")),
                Status::Canceled,
            ),
        ];
        for (verdict, expected) in cases {
            let event = translate(
                "demo.Sample",
                MARKER,
                None,
                "test 1",
                &TestOutcome::new(verdict, 7),
            );
            assert_eq!(event.status, expected);
            assert_eq!(event.duration_ms, 7);
        }
    }

    #[test]
    fn ignored_forces_negative_duration() {
        let event = translate(
            "demo.Sample",
            MARKER,
            None,
            "test 1",
            &TestOutcome::new(Verdict::Ignored, 42),
        );
        assert_eq!(event.status, Status::Ignored);
        assert_eq!(event.duration_ms, -1);
    }

    #[test]
    fn selector_shape_tracks_nesting() {
        let outcome = TestOutcome::passed(1);
        let top = translate("demo.Outer", MARKER, None, "t", &outcome);
        assert_eq!(top.selector, EventSelector::Test { name: "t".into() });

        let nested = translate("demo.Outer", MARKER, Some("demo.Inner"), "t", &outcome);
        assert_eq!(
            nested.selector,
            EventSelector::NestedTest {
                suite_id: "demo.Inner".into(),
                test_name: "t".into(),
            }
        );
    }

    #[test]
    fn aborted_events_use_suite_shaped_selectors() {
        let top = suite_aborted("demo.Outer", MARKER, None, FailureDetail::new("ctor"));
        assert_eq!(top.status, Status::Error);
        assert_eq!(top.selector, EventSelector::Suite);
        assert!(!top.selector.is_test());

        let nested = suite_aborted(
            "demo.Outer",
            MARKER,
            Some("demo.Inner"),
            FailureDetail::new("hook"),
        );
        assert_eq!(
            nested.selector,
            EventSelector::NestedSuite {
                suite_id: "demo.Inner".into()
            }
        );
    }
}
