//! Summary aggregation: accumulated counts, ordered failure and cancellation
//! reminders, and the one-shot rendering of the final host-facing report.

use std::time::Instant;

use parking_lot::Mutex;

use crate::config::Presentation;
use crate::errors::EngineError;
use crate::events::{EventSelector, Status, StatusEvent};
use crate::suite::FailureDetail;

/// A deferred report of one failed or canceled test, kept in the order the
/// outcome occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub suite: String,
    pub test: String,
    pub kind: ReminderKind,
    pub throwable: Option<FailureDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    Failed,
    Canceled,
}

#[derive(Debug, Default)]
struct SummaryState {
    succeeded: u64,
    failed: u64,
    canceled: u64,
    ignored: u64,
    pending: u64,
    // Skipped tests are tracked but never rendered; they are excluded from
    // the total like ignored and pending ones.
    skipped: u64,
    suites_completed: u64,
    suites_aborted: u64,
    reminders: Vec<Reminder>,
    done: bool,
}

/// Thread-safe accumulator for one run. `record` tolerates concurrent callers
/// from multiple workers; `complete` freezes and renders exactly once.
pub struct SummaryAggregator {
    start: Instant,
    presentation: Presentation,
    state: Mutex<SummaryState>,
}

impl SummaryAggregator {
    pub fn new(presentation: Presentation) -> Self {
        Self {
            start: Instant::now(),
            presentation,
            state: Mutex::new(SummaryState::default()),
        }
    }

    /// Bookkeeping for one status event. Never fails. Test-shaped selectors
    /// update the test counters; suite-shaped error events count as aborts.
    pub fn record(&self, event: &StatusEvent) {
        let mut state = self.state.lock();
        match &event.selector {
            EventSelector::Test { .. } | EventSelector::NestedTest { .. } => {
                match event.status {
                    Status::Success => state.succeeded += 1,
                    Status::Failure | Status::Error => {
                        state.failed += 1;
                        let reminder = reminder_from(event, ReminderKind::Failed);
                        state.reminders.push(reminder);
                    }
                    Status::Canceled => {
                        state.canceled += 1;
                        let reminder = reminder_from(event, ReminderKind::Canceled);
                        state.reminders.push(reminder);
                    }
                    Status::Ignored => state.ignored += 1,
                    Status::Pending => state.pending += 1,
                    Status::Skipped => state.skipped += 1,
                }
            }
            EventSelector::Suite | EventSelector::NestedSuite { .. } => {
                if event.status == Status::Error {
                    state.suites_aborted += 1;
                }
            }
        }
    }

    /// One suite (top-level or nested) ran its hooks and tests to completion.
    pub fn suite_completed(&self) {
        self.state.lock().suites_completed += 1;
    }

    /// Freeze the summary and render the final report. Callable exactly once;
    /// a second call is a programming error.
    pub fn complete(&self) -> Result<String, EngineError> {
        let mut state = self.state.lock();
        if state.done {
            return Err(EngineError::DoubleCompletion);
        }
        state.done = true;
        Ok(render(&state, self.start.elapsed().as_millis(), &self.presentation))
    }

    #[cfg(test)]
    pub(crate) fn reminders(&self) -> Vec<Reminder> {
        self.state.lock().reminders.clone()
    }
}

fn reminder_from(event: &StatusEvent, kind: ReminderKind) -> Reminder {
    Reminder {
        suite: event.fully_qualified_name.clone(),
        test: event.selector.test_name().unwrap_or_default().to_string(),
        kind,
        throwable: event.throwable.clone(),
    }
}

fn render(state: &SummaryState, elapsed_ms: u128, presentation: &Presentation) -> String {
    let total = state.succeeded + state.failed + state.canceled;
    let mut lines = Vec::new();
    lines.push(format!("Run completed in {elapsed_ms} milliseconds."));
    lines.push(format!("Total number of tests run: {total}"));
    lines.push(format!(
        "Suites: completed {}, aborted {}",
        state.suites_completed, state.suites_aborted
    ));
    lines.push(format!(
        "Tests: succeeded {}, failed {}, canceled {}, ignored {}, pending {}",
        state.succeeded, state.failed, state.canceled, state.ignored, state.pending
    ));

    if state.failed == 0 && state.suites_aborted == 0 {
        lines.push("All tests passed.".to_string());
        return lines.join("\n");
    }

    if state.failed > 0 {
        lines.push(banner(state.failed, "TEST", "FAILED"));
    } else {
        lines.push(banner(state.suites_aborted, "SUITE", "ABORTED"));
    }

    for reminder in &state.reminders {
        if reminder.kind == ReminderKind::Canceled && presentation.suppress_canceled_reminders {
            continue;
        }
        lines.push(format!("{}:", reminder.suite));
        lines.push(String::new());
        let marker = match reminder.kind {
            ReminderKind::Failed => "*** FAILED ***",
            ReminderKind::Canceled => "!!! CANCELED !!!",
        };
        lines.push(format!("- {} {}", reminder.test, marker));
        if let Some(throwable) = &reminder.throwable {
            lines.push(format!("  {}", throwable.message));
            for line in stack_lines(throwable, presentation) {
                lines.push(format!("  {line}"));
            }
        }
    }

    lines.join("\n")
}

fn banner(count: u64, noun: &str, verb: &str) -> String {
    if count == 1 {
        format!("*** 1 {noun} {verb} ***")
    } else {
        format!("*** {count} {noun}S {verb} ***")
    }
}

fn stack_lines<'a>(throwable: &'a FailureDetail, presentation: &Presentation) -> &'a [String] {
    const SHORT_STACK_LINES: usize = 3;
    if presentation.reminder_full_stacks {
        &throwable.detail
    } else if presentation.reminder_short_stacks {
        let n = throwable.detail.len().min(SHORT_STACK_LINES);
        &throwable.detail[..n]
    } else {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::translate;
    use crate::request::CapabilityMarker;
    use crate::suite::{TestOutcome, Verdict};

    const MARKER: CapabilityMarker = CapabilityMarker::Wrapped;

    fn event(test: &str, verdict: Verdict) -> StatusEvent {
        translate(
            "demo.Sample",
            MARKER,
            None,
            test,
            &TestOutcome::new(verdict, 1),
        )
    }

    #[test]
    fn all_passed_report() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        for name in ["test 1", "test 2", "test 3"] {
            aggregator.record(&event(name, Verdict::Passed));
        }
        aggregator.suite_completed();

        let report = aggregator.complete().unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert!(lines[0].starts_with("Run completed in "));
        assert_eq!(lines[1], "Total number of tests run: 3");
        assert_eq!(lines[2], "Suites: completed 1, aborted 0");
        assert_eq!(
            lines[3],
            "Tests: succeeded 3, failed 0, canceled 0, ignored 0, pending 0"
        );
        assert_eq!(lines[4], "All tests passed.");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn failed_report_has_banner_and_reminder_block() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        aggregator.record(&event("test 1", Verdict::Passed));
        aggregator.record(&event(
            "test 2",
            Verdict::Failed(FailureDetail::new("2 was not 3")),
        ));
        aggregator.suite_completed();

        let report = aggregator.complete().unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[1], "Total number of tests run: 2");
        assert_eq!(lines[4], "*** 1 TEST FAILED ***");
        assert_eq!(lines[5], "demo.Sample:");
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "- test 2 *** FAILED ***");
        assert_eq!(lines[8], "  2 was not 3");
    }

    #[test]
    fn plural_banner() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        aggregator.record(&event("a", Verdict::Failed(FailureDetail::new("x"))));
        aggregator.record(&event("b", Verdict::Failed(FailureDetail::new("y"))));
        let report = aggregator.complete().unwrap();
        assert!(report.contains("*** 2 TESTS FAILED ***"));
    }

    #[test]
    fn ignored_and_pending_are_excluded_from_total() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        aggregator.record(&event("a", Verdict::Passed));
        aggregator.record(&event("b", Verdict::Ignored));
        aggregator.record(&event("c", Verdict::Pending));
        aggregator.record(&event("d", Verdict::Skipped("later".into())));
        let report = aggregator.complete().unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[1], "Total number of tests run: 1");
        assert_eq!(
            lines[3],
            "Tests: succeeded 1, failed 0, canceled 0, ignored 1, pending 1"
        );
    }

    #[test]
    fn canceled_reminders_respect_suppression_independently() {
        let canceled = event("c", Verdict::Canceled(FailureDetail::new("db down")));
        let failed = event("f", Verdict::Failed(FailureDetail::new("bad")));

        let aggregator = SummaryAggregator::new(Presentation::default());
        aggregator.record(&canceled);
        aggregator.record(&failed);
        let report = aggregator.complete().unwrap();
        assert!(report.contains("- c !!! CANCELED !!!"));
        assert!(report.contains("- f *** FAILED ***"));

        let suppressing = Presentation {
            suppress_canceled_reminders: true,
            ..Presentation::default()
        };
        let aggregator = SummaryAggregator::new(suppressing);
        aggregator.record(&canceled);
        aggregator.record(&failed);
        let report = aggregator.complete().unwrap();
        assert!(!report.contains("!!! CANCELED !!!"));
        assert!(report.contains("- f *** FAILED ***"));
    }

    #[test]
    fn reminder_stack_detail_follows_presentation() {
        let detail = FailureDetail::with_detail(
            "boom",
            vec![
                "at demo.Sample.one".into(),
                "at demo.Sample.two".into(),
                "at demo.Sample.three".into(),
                "at demo.Sample.four".into(),
            ],
        );
        let failed = event("f", Verdict::Failed(detail));

        let short = Presentation {
            reminder_short_stacks: true,
            reminders: true,
            ..Presentation::default()
        };
        let aggregator = SummaryAggregator::new(short);
        aggregator.record(&failed);
        let report = aggregator.complete().unwrap();
        assert!(report.contains("  at demo.Sample.three"));
        assert!(!report.contains("  at demo.Sample.four"));

        let full = Presentation {
            reminder_full_stacks: true,
            reminders: true,
            ..Presentation::default()
        };
        let aggregator = SummaryAggregator::new(full);
        aggregator.record(&failed);
        let report = aggregator.complete().unwrap();
        assert!(report.contains("  at demo.Sample.four"));
    }

    #[test]
    fn second_completion_fails() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        aggregator.complete().unwrap();
        assert!(matches!(
            aggregator.complete(),
            Err(EngineError::DoubleCompletion)
        ));
    }

    #[test]
    fn suite_aborts_count_and_banner() {
        let aggregator = SummaryAggregator::new(Presentation::default());
        let abort = crate::events::suite_aborted(
            "demo.Broken",
            MARKER,
            None,
            FailureDetail::new("no ctor"),
        );
        aggregator.record(&abort);
        let report = aggregator.complete().unwrap();
        assert!(report.contains("Suites: completed 0, aborted 1"));
        assert!(report.contains("*** 1 SUITE ABORTED ***"));
        assert!(aggregator.reminders().is_empty());
    }
}
