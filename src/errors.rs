//! Unified error type for all engine failure modes.
//!
//! Every fallible operation in the engine surfaces one of the variants below.
//! Per-test outcomes (failures, errors, cancellations) are *not* errors in this
//! sense: they are recovered locally into status events and never interrupt
//! sibling test execution.

use miette::Diagnostic;
use thiserror::Error;

use crate::suite::FailureDetail;

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A run option was malformed, or names a feature this hosted engine does
    /// not support. Fatal to the invocation; raised at runner-construction time.
    #[error("invalid argument: {message}")]
    #[diagnostic(code(pariksha::argument))]
    Argument {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// An explicitly specified run request named a suite that cannot be
    /// resolved to a loadable, capability-matching class.
    #[error("cannot resolve suite '{qualified_name}': {reason}")]
    #[diagnostic(code(pariksha::resolution))]
    Resolution {
        qualified_name: String,
        reason: String,
    },

    /// Suite instantiation itself failed. This is reported as a
    /// suite-started/suite-aborted event pair *and* escalated, because the
    /// host must know the task did not complete normally.
    #[error("suite '{suite}' could not be constructed")]
    #[diagnostic(code(pariksha::construction))]
    Construction {
        suite: String,
        #[source]
        source: FailureDetail,
    },

    /// The run summary was requested a second time. Programming error.
    #[error("run summary has already been completed")]
    #[diagnostic(
        code(pariksha::double_completion),
        help("`done` is a one-shot operation; create a new runner for another run")
    )]
    DoubleCompletion,
}

impl EngineError {
    pub fn argument(message: impl Into<String>) -> Self {
        EngineError::Argument {
            message: message.into(),
            help: None,
        }
    }

    pub fn argument_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        EngineError::Argument {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn resolution(qualified_name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Resolution {
            qualified_name: qualified_name.into(),
            reason: reason.into(),
        }
    }
}
