//! Remote configuration codec for fork mode.
//!
//! A forked sub-process gets its own engine instance, suite hierarchy, and
//! result sinks; the only thing crossing the process boundary is the subset
//! of the configuration needed to reproduce the same reporter behavior,
//! serialized as a single argument token at startup.

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, Presentation};
use crate::errors::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub presentation: Presentation,
    pub reporter_classes: Vec<String>,
    pub sorting_timeout_ms: u64,
}

impl RemoteConfig {
    /// Capture the forkable subset of a configuration.
    pub fn capture(config: &Configuration) -> Self {
        Self {
            presentation: config.presentation,
            reporter_classes: config.reporter_classes.clone(),
            sorting_timeout_ms: config.sorting_timeout_ms,
        }
    }

    /// Serialize for handoff as host argument tokens.
    pub fn encode(&self) -> Result<Vec<String>, EngineError> {
        let token = serde_json::to_string(self).map_err(|e| {
            EngineError::argument(format!("failed to encode remote configuration: {e}"))
        })?;
        Ok(vec![token])
    }

    /// Decode the handoff on the forked side. An empty token list means the
    /// runner was not forked; anything unparseable is an argument error.
    pub fn decode(remote_args: &[String]) -> Result<Option<RemoteConfig>, EngineError> {
        let token = match remote_args.first() {
            Some(token) => token,
            None => return Ok(None),
        };
        let decoded = serde_json::from_str(token).map_err(|e| {
            EngineError::argument(format!("malformed remote configuration: {e}"))
        })?;
        Ok(Some(decoded))
    }

    /// Overlay the forked-in reporter settings onto a local configuration.
    pub fn apply(&self, config: &mut Configuration) {
        config.presentation = self.presentation;
        config.reporter_classes = self.reporter_classes.clone();
        config.sorting_timeout_ms = self.sorting_timeout_ms;
    }
}
