//! The engine lifecycle the host drives: build a runner from option tokens,
//! turn run requests into tasks, execute them, and collect the one-shot
//! summary.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::{AlertConfig, Configuration};
use crate::errors::EngineError;
use crate::events::{EventSink, LogSink};
use crate::executor::TaskExecutor;
use crate::remote::RemoteConfig;
use crate::request::RunRequest;
use crate::selector::Selector;
use crate::suite::SuiteRegistry;
use crate::summary::SummaryAggregator;
use crate::task::Task;

/// Build a runner from recognized option tokens. `remote_args` carry a forked
/// parent's reporter settings and, when present, override the local ones.
pub fn runner(
    args: &[String],
    remote_args: &[String],
    registry: Arc<SuiteRegistry>,
) -> Result<Runner, EngineError> {
    let mut config = Configuration::from_args(args)?;
    if let Some(remote) = RemoteConfig::decode(remote_args)? {
        remote.apply(&mut config);
    }
    Ok(Runner::new(config, registry))
}

pub struct Runner {
    config: Arc<Configuration>,
    registry: Arc<SuiteRegistry>,
    summary: Arc<SummaryAggregator>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").finish_non_exhaustive()
    }
}

impl Runner {
    fn new(config: Configuration, registry: Arc<SuiteRegistry>) -> Self {
        let summary = Arc::new(SummaryAggregator::new(config.presentation));
        Self {
            config: Arc::new(config),
            registry,
            summary,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Slow-run alert settings, for hosts that drive periodic notifications.
    pub fn alert(&self) -> Option<AlertConfig> {
        self.config.alert
    }

    /// Resolve run requests into executable tasks.
    ///
    /// Requests pruned here never become tasks at all: suites outside the
    /// package filters, discovery-exempt suites that were not explicitly
    /// specified, nested suites already claimed by a sibling request's
    /// selectors, and non-explicit requests that cannot be resolved. An
    /// *explicit* request that names an unloadable or capability-mismatched
    /// suite fails the whole call.
    pub fn tasks(&self, requests: Vec<RunRequest>) -> Result<Vec<Task>, EngineError> {
        // Nested suites named by selectors are folded into their owning task
        // and must not also surface as independent discoverable units.
        let claimed_nested: BTreeSet<String> = requests
            .iter()
            .flat_map(|r| r.selectors.iter())
            .filter_map(|s| match s {
                Selector::NestedSuite { suite_id } => Some(suite_id.clone()),
                Selector::NestedTest { suite_id, .. } => Some(suite_id.clone()),
                _ => None,
            })
            .collect();

        let mut tasks = Vec::new();
        for request in requests {
            if !self.config.package_allowed(request.package()) {
                tracing::debug!(suite = %request.qualified_name, "outside package filters");
                continue;
            }
            if !request.explicitly_specified && claimed_nested.contains(&request.qualified_name) {
                tracing::debug!(suite = %request.qualified_name, "claimed as nested elsewhere");
                continue;
            }

            let kind = match self.registry.kind_of(&request.qualified_name) {
                Some(kind) => kind,
                None if request.explicitly_specified => {
                    return Err(EngineError::resolution(
                        request.qualified_name,
                        "no suite with this name is registered",
                    ));
                }
                None => continue,
            };
            if !kind.satisfies(request.marker) {
                if request.explicitly_specified {
                    return Err(EngineError::resolution(
                        request.qualified_name,
                        "the capability marker does not match the registered suite",
                    ));
                }
                continue;
            }
            if self.registry.is_discovery_exempt(&request.qualified_name)
                && !request.explicitly_specified
            {
                continue;
            }

            tasks.push(Task::new(
                request,
                Arc::clone(&self.registry),
                Arc::clone(&self.config),
                Arc::clone(&self.summary),
            ));
        }
        tracing::debug!(count = tasks.len(), "tasks created");
        Ok(tasks)
    }

    /// Run a batch of tasks through the configured executor.
    pub fn execute(
        &self,
        tasks: &[Task],
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) -> Result<(), EngineError> {
        TaskExecutor::from_config(&self.config).run(tasks, sink, logs)
    }

    /// The serialized configuration subset a forked sub-process needs.
    pub fn remote_args(&self) -> Result<Vec<String>, EngineError> {
        RemoteConfig::capture(&self.config).encode()
    }

    /// Freeze the run and render the summary report. Exactly once per runner;
    /// a second call fails rather than hanging or double-counting.
    pub fn done(&self) -> Result<String, EngineError> {
        self.summary.complete()
    }
}
