//! Tasks: one executable unit per top-level run request.
//!
//! A task owns exactly one request and, on execution, runs the resolved suite
//! and any in-scope nested suites itself. It never re-exposes nested suites
//! as separate top-level units, so `execute` always hands back an empty task
//! list; the return value exists only to satisfy the host protocol shape.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Configuration;
use crate::errors::EngineError;
use crate::events::{suite_aborted, translate, EventSink, LogSink, StatusEvent};
use crate::request::RunRequest;
use crate::selector::{self, ResolvedUnit};
use crate::suite::{FailureDetail, Suite, SuiteRegistry};
use crate::summary::SummaryAggregator;

pub struct Task {
    request: RunRequest,
    registry: Arc<SuiteRegistry>,
    config: Arc<Configuration>,
    summary: Arc<SummaryAggregator>,
    discovery_exempt: bool,
    tags: BTreeSet<String>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("request", &self.request)
            .field("discovery_exempt", &self.discovery_exempt)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub(crate) fn new(
        request: RunRequest,
        registry: Arc<SuiteRegistry>,
        config: Arc<Configuration>,
        summary: Arc<SummaryAggregator>,
    ) -> Self {
        let discovery_exempt = registry.is_discovery_exempt(&request.qualified_name);
        let tags = registry.tags_of(&request.qualified_name);
        Self {
            request,
            registry,
            config,
            summary,
            discovery_exempt,
            tags,
        }
    }

    /// The originating run request.
    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    /// Class-level tag markers of the target suite, inherited ones included.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Construct the suite, run the resolved units with nested-suite folding,
    /// and forward every translated event immediately.
    ///
    /// The returned task list is always empty. Construction failure is the
    /// one path that is both reported (as a suite-started/suite-aborted pair)
    /// and escalated to the caller.
    pub fn execute(
        &self,
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) -> Result<Vec<Task>, EngineError> {
        let name = &self.request.qualified_name;
        tracing::debug!(suite = %name, "task starting");

        let suite = match self.registry.construct(name) {
            Some(Ok(suite)) => suite,
            Some(Err(detail)) => {
                self.report_construction_failure(name, &detail, sink, logs);
                return Err(EngineError::Construction {
                    suite: name.clone(),
                    source: detail,
                });
            }
            None => {
                // The runner verifies registration at task-creation time, so
                // a missing entry here means the registry changed under us.
                return Err(EngineError::resolution(
                    name.clone(),
                    "suite disappeared from the registry",
                ));
            }
        };

        let resolved = selector::resolve(
            &self.request,
            suite.as_ref(),
            self.discovery_exempt,
            &self.config,
        );

        for log in logs {
            log.info(&format!("{name}:"));
        }

        if let Err(detail) = suite.setup() {
            self.emit_abort(None, detail, sink, logs);
            return Ok(Vec::new());
        }

        // Child results precede parent results: nested suites first, in
        // declared order, then the top-level suite's own tests.
        let nested_suites = suite.nested();
        for nested in &nested_suites {
            let selected: Vec<&ResolvedUnit> = resolved
                .units
                .iter()
                .filter(|u| u.nested.as_deref() == Some(nested.id()))
                .collect();
            if selected.is_empty() {
                continue;
            }
            self.run_suite_portion(nested.as_ref(), Some(nested.id()), &selected, sink, logs);
        }

        let top_selected: Vec<&ResolvedUnit> = resolved
            .units
            .iter()
            .filter(|u| u.nested.is_none())
            .collect();
        for unit in &top_selected {
            self.run_one_test(suite.as_ref(), None, &unit.test, sink, logs);
        }

        match suite.teardown() {
            Ok(()) => self.summary.suite_completed(),
            Err(detail) => self.emit_abort(None, detail, sink, logs),
        }

        tracing::debug!(suite = %name, "task finished");
        Ok(Vec::new())
    }

    /// Run one nested suite's selected tests, bracketed by its hooks. A setup
    /// failure aborts the nested suite before any of its tests run; a
    /// teardown failure leaves the already-emitted test events standing and
    /// adds one aborted event.
    fn run_suite_portion(
        &self,
        suite: &dyn Suite,
        nested: Option<&str>,
        selected: &[&ResolvedUnit],
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) {
        for log in logs {
            log.info(&format!("{}:", suite.id()));
        }
        if let Err(detail) = suite.setup() {
            self.emit_abort(nested, detail, sink, logs);
            return;
        }
        for unit in selected {
            self.run_one_test(suite, nested, &unit.test, sink, logs);
        }
        match suite.teardown() {
            Ok(()) => self.summary.suite_completed(),
            Err(detail) => self.emit_abort(nested, detail, sink, logs),
        }
    }

    fn run_one_test(
        &self,
        suite: &dyn Suite,
        nested: Option<&str>,
        test: &str,
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) {
        let outcome = suite.run_test(test);
        let event = translate(
            &self.request.qualified_name,
            self.request.marker,
            nested,
            test,
            &outcome,
        );
        self.log_result_line(test, &event, logs);
        self.forward(event, sink);
    }

    fn report_construction_failure(
        &self,
        name: &str,
        detail: &FailureDetail,
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) {
        for log in logs {
            log.info(&format!("{name}:"));
        }
        self.emit_abort(None, detail.clone(), sink, logs);
    }

    fn emit_abort(
        &self,
        nested: Option<&str>,
        detail: FailureDetail,
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) {
        let subject = nested.unwrap_or(&self.request.qualified_name);
        for log in logs {
            log.error(&format!("{subject} *** ABORTED ***"));
            log.error(&format!("  {}", detail.message));
        }
        let event = suite_aborted(
            &self.request.qualified_name,
            self.request.marker,
            nested,
            detail,
        );
        self.forward(event, sink);
    }

    /// Every emitted event is recorded into the shared summary and handed to
    /// the host sink in the same breath, never buffered or reordered here.
    fn forward(&self, event: StatusEvent, sink: &dyn EventSink) {
        self.summary.record(&event);
        sink.handle(event);
    }

    fn log_result_line(&self, test: &str, event: &StatusEvent, logs: &[&dyn LogSink]) {
        use crate::events::Status;

        let duration = if self.config.presentation.durations && event.duration_ms >= 0 {
            format!(" ({} milliseconds)", event.duration_ms)
        } else {
            String::new()
        };
        let (line, failed) = match event.status {
            Status::Success => (format!("- {test}{duration}"), false),
            Status::Failure | Status::Error => {
                (format!("- {test} *** FAILED ***{duration}"), true)
            }
            Status::Canceled => (format!("- {test} !!! CANCELED !!!{duration}"), false),
            Status::Ignored => (format!("- {test} !!! IGNORED !!!"), false),
            Status::Pending => (format!("- {test} (pending)"), false),
            Status::Skipped => (format!("- {test} (skipped)"), false),
        };
        for log in logs {
            if failed {
                log.error(&line);
                if let Some(throwable) = &event.throwable {
                    log.error(&format!("  {}", throwable.message));
                }
            } else {
                log.info(&line);
            }
        }
    }
}
