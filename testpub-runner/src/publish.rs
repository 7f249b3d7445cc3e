// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort publishing of results to an HTTP endpoint.

use crate::{
    errors::{DisplayErrorChain, PublishError},
    record::TestResult,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tracing::{debug, warn};

/// Posts results as JSON to a URL.
///
/// Publishing is best-effort: failures are logged and otherwise ignored, and never retried.
#[derive(Debug)]
pub struct HttpPublisher {
    url: String,
    agent: ureq::Agent,
    warned: AtomicBool,
}

impl HttpPublisher {
    /// Creates a new publisher for the given URL. Each request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(true)
            .build();

        Self {
            url: url.into(),
            agent: ureq::Agent::new_with_config(config),
            warned: AtomicBool::new(false),
        }
    }

    /// The URL results are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts a result, discarding any error.
    pub fn publish(&self, result: &TestResult) {
        match self.try_publish(result) {
            Ok(()) => {
                debug!("published result for `{}` to `{}`", result.node_id(), self.url);
            }
            Err(error) => {
                // Warn once so an unreachable endpoint doesn't flood the output.
                if self.warned.swap(true, Ordering::Relaxed) {
                    debug!("{}", DisplayErrorChain::new(&error));
                } else {
                    warn!(
                        "{} (further publish errors are only logged at debug level)",
                        DisplayErrorChain::new(&error),
                    );
                }
            }
        }
    }

    /// Posts a result, returning any error.
    pub fn try_publish(&self, result: &TestResult) -> Result<(), PublishError> {
        let body = serde_json::to_vec(result).map_err(|error| PublishError::Serialize {
            url: self.url.clone(),
            error,
        })?;

        self.agent
            .post(&self.url)
            .header("content-type", "application/json")
            .send(&body[..])
            .map_err(|error| PublishError::Transport {
                url: self.url.clone(),
                error: Box::new(error),
            })?;

        Ok(())
    }
}
