//! Configuration builder: validates and normalizes the recognized run options
//! into an immutable [`Configuration`].
//!
//! Option tokens arrive pre-split from the host; only the recognized option
//! semantics live here. Anything malformed, and every option that is
//! meaningless in this hosted context, fails fast with a descriptive
//! argument error.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Default bound on how long result presentation waits for in-flight tests
/// under parallel execution.
pub const DEFAULT_SORTING_TIMEOUT_MS: u64 = 15_000;

/// Periodic "alert" notification settings from `-W <delay> <interval>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub delay: u64,
    pub interval: u64,
}

/// Presentation flags parsed from `-o…`/`-e…` strings. The first occurrence
/// of each stream wins when repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Presentation {
    /// `D`: show durations on result lines.
    pub durations: bool,
    /// `W`: plain output, no color.
    pub without_color: bool,
    /// `S`: short stack detail.
    pub short_stacks: bool,
    /// `F`: full stack detail.
    pub full_stacks: bool,
    /// `I`, `T` or `G`: emit failure reminders while streaming.
    pub reminders: bool,
    /// `T`: reminders carry short stack detail.
    pub reminder_short_stacks: bool,
    /// `G`: reminders carry full stack detail.
    pub reminder_full_stacks: bool,
    /// `K`: leave canceled tests out of the reminder section.
    pub suppress_canceled_reminders: bool,
}

/// Immutable, validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// `-l`: tests carrying any of these tags are excluded entirely.
    pub excluded_tags: BTreeSet<String>,
    /// `-n`: when non-empty, only tests carrying one of these tags run.
    pub included_tags: BTreeSet<String>,
    /// `-m`: include suites in these packages only, not sub-packages.
    pub member_packages: Vec<String>,
    /// `-w`: include suites in these packages and their sub-packages.
    pub wildcard_packages: Vec<String>,
    /// `-z`: substring test-name filters.
    pub wildcard_test_names: Vec<String>,
    /// `-t`: exact test-name filters.
    pub exact_test_names: Vec<String>,
    /// `-C`: custom reporter class names, recorded for the host.
    pub reporter_classes: Vec<String>,
    /// `-W`: slow-run alert settings.
    pub alert: Option<AlertConfig>,
    /// `-T`: test-sorting timeout in milliseconds.
    pub sorting_timeout_ms: u64,
    /// `-P<n>`: worker pool size; 1 means strictly sequential.
    pub worker_count: usize,
    pub presentation: Presentation,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            excluded_tags: BTreeSet::new(),
            included_tags: BTreeSet::new(),
            member_packages: Vec::new(),
            wildcard_packages: Vec::new(),
            wildcard_test_names: Vec::new(),
            exact_test_names: Vec::new(),
            reporter_classes: Vec::new(),
            alert: None,
            sorting_timeout_ms: DEFAULT_SORTING_TIMEOUT_MS,
            worker_count: 1,
            presentation: Presentation::default(),
        }
    }
}

/// Options that exist in the standalone tool but are meaningless when the
/// engine runs embedded in a host. Each entry maps the option to the feature
/// it would configure and the recommended alternative.
static UNSUPPORTED_OPTIONS: Lazy<Vec<(&'static str, &'static str, &'static str)>> =
    Lazy::new(|| {
        vec![
            (
                "-s",
                "direct suite selection",
                "select the suite through the host's test-selection command instead",
            ),
            (
                "-j",
                "running wrapped junit-style suites by name",
                "let the host's own junit integration schedule those suites",
            ),
            (
                "-b",
                "running wrapped testng-style suites by name",
                "let the host's own testng integration schedule those suites",
            ),
            (
                "-R",
                "overriding the runpath",
                "the host controls the runpath; adjust its classpath settings instead",
            ),
            (
                "-A",
                "re-running tests recorded in an again file",
                "use the host's failed-test re-run command instead",
            ),
            (
                "-q",
                "narrowing discovery by suffix",
                "narrow discovery with the host's test filters instead",
            ),
        ]
    });

impl Configuration {
    /// Parse and validate recognized run options. The first offending token
    /// fails the whole invocation.
    pub fn from_args(args: &[String]) -> Result<Configuration, EngineError> {
        let mut config = Configuration::default();
        let mut seen_stdout_flags = false;
        let mut seen_stderr_flags = false;

        let mut iter = args.iter().peekable();
        while let Some(token) = iter.next() {
            if let Some((_, feature, alternative)) = UNSUPPORTED_OPTIONS
                .iter()
                .find(|(opt, _, _)| opt == token)
            {
                return Err(EngineError::argument_with_help(
                    format!("{token} ({feature}) is not supported by this hosted engine"),
                    *alternative,
                ));
            }

            match token.as_str() {
                "-l" => {
                    config.excluded_tags.insert(required_value(token, &mut iter)?);
                }
                "-n" => {
                    config.included_tags.insert(required_value(token, &mut iter)?);
                }
                "-w" => {
                    config.wildcard_packages.push(required_value(token, &mut iter)?);
                }
                "-m" => {
                    config.member_packages.push(required_value(token, &mut iter)?);
                }
                "-z" => {
                    config
                        .wildcard_test_names
                        .push(required_value(token, &mut iter)?);
                }
                "-t" => {
                    config.exact_test_names.push(required_value(token, &mut iter)?);
                }
                "-C" => {
                    config.reporter_classes.push(required_value(token, &mut iter)?);
                }
                "-W" => {
                    let delay = required_positive(token, "delay", &mut iter)?;
                    let interval = required_positive(token, "interval", &mut iter)?;
                    config.alert = Some(AlertConfig { delay, interval });
                }
                "-T" => {
                    config.sorting_timeout_ms = required_number(token, "timeout", &mut iter)?;
                }
                _ if token.starts_with("-P") => {
                    config.worker_count = parse_worker_count(token)?;
                }
                _ if token.starts_with("-o") => {
                    if !seen_stdout_flags {
                        apply_presentation_flags(token, &mut config.presentation)?;
                        seen_stdout_flags = true;
                    }
                }
                _ if token.starts_with("-e") => {
                    if !seen_stderr_flags {
                        apply_presentation_flags(token, &mut config.presentation)?;
                        seen_stderr_flags = true;
                    }
                }
                _ => {
                    return Err(EngineError::argument(format!(
                        "unrecognized option: {token}"
                    )));
                }
            }
        }

        tracing::debug!(workers = config.worker_count, "configuration built");
        Ok(config)
    }

    /// Whether a suite in `package` passes the `-m`/`-w` package filters.
    /// With neither filter present, every package passes.
    pub fn package_allowed(&self, package: &str) -> bool {
        if self.member_packages.is_empty() && self.wildcard_packages.is_empty() {
            return true;
        }
        if self.member_packages.iter().any(|m| m == package) {
            return true;
        }
        self.wildcard_packages
            .iter()
            .any(|w| package == w || package.starts_with(&format!("{w}.")))
    }

    /// Whether a test name passes the `-t`/`-z` name filters. With neither
    /// filter present, every name passes.
    pub fn test_name_allowed(&self, name: &str) -> bool {
        if self.exact_test_names.is_empty() && self.wildcard_test_names.is_empty() {
            return true;
        }
        self.exact_test_names.iter().any(|t| t == name)
            || self.wildcard_test_names.iter().any(|z| name.contains(z))
    }

    /// Whether a test carrying `tags` passes the `-l`/`-n` tag filters.
    pub fn tags_allowed(&self, tags: &BTreeSet<String>) -> bool {
        if tags.iter().any(|t| self.excluded_tags.contains(t)) {
            return false;
        }
        if self.included_tags.is_empty() {
            return true;
        }
        tags.iter().any(|t| self.included_tags.contains(t))
    }
}

fn required_value(
    option: &str,
    iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>,
) -> Result<String, EngineError> {
    match iter.next() {
        Some(value) => Ok(value.clone()),
        None => Err(EngineError::argument(format!(
            "{option} requires an argument"
        ))),
    }
}

fn required_number(
    option: &str,
    what: &str,
    iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>,
) -> Result<u64, EngineError> {
    let raw = match iter.next() {
        Some(value) => value,
        None => {
            return Err(EngineError::argument(format!(
                "{option} requires a numeric {what} argument"
            )));
        }
    };
    raw.parse::<u64>().map_err(|_| {
        EngineError::argument(format!(
            "{option} {what} must be a non-negative integer, got '{raw}'"
        ))
    })
}

fn required_positive(
    option: &str,
    what: &str,
    iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>,
) -> Result<u64, EngineError> {
    let value = required_number(option, what, iter)?;
    if value == 0 {
        return Err(EngineError::argument(format!(
            "{option} {what} must be a positive integer"
        )));
    }
    Ok(value)
}

fn parse_worker_count(token: &str) -> Result<usize, EngineError> {
    let rest = &token[2..];
    if rest == "S" {
        return Err(EngineError::argument_with_help(
            "-PS (buffered parallel output) is not supported by this hosted engine",
            "use a plain -P<n> worker count; event grouping is bounded by -T instead",
        ));
    }
    let parsed = rest.parse::<i64>().ok();
    match parsed {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(EngineError::argument_with_help(
            format!("{token} must name a positive worker count"),
            format!(
                "this machine has {} logical cpus; try -P{}",
                num_cpus::get(),
                num_cpus::get()
            ),
        )),
    }
}

fn apply_presentation_flags(
    token: &str,
    presentation: &mut Presentation,
) -> Result<(), EngineError> {
    for flag in token[2..].chars() {
        match flag {
            'D' => presentation.durations = true,
            'W' => presentation.without_color = true,
            'S' => presentation.short_stacks = true,
            'F' => presentation.full_stacks = true,
            'I' => presentation.reminders = true,
            'T' => {
                presentation.reminders = true;
                presentation.reminder_short_stacks = true;
            }
            'G' => {
                presentation.reminders = true;
                presentation.reminder_full_stacks = true;
            }
            'K' => presentation.suppress_canceled_reminders = true,
            other => {
                return Err(EngineError::argument(format!(
                    "unrecognized reporter flag '{other}' in {token}"
                )));
            }
        }
    }
    Ok(())
}
