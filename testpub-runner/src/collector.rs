// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session collector: the entry point a test runner calls once per finished test.

use crate::{
    config::PublishConfig,
    errors::PubdirError,
    pubdir::Pubdir,
    publish::HttpPublisher,
    record::{TestFinished, TestResult},
};
use tracing::debug;

/// Collects finished tests and publishes them to the configured sinks.
///
/// Either sink may be configured on its own. HTTP failures are swallowed; filesystem failures are
/// returned since they indicate a damaged result tree.
#[derive(Debug, Default)]
pub struct SessionCollector {
    publisher: Option<HttpPublisher>,
    pubdir: Option<Pubdir>,
}

impl SessionCollector {
    /// Creates a collector with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector from configuration.
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            publisher: config
                .publish_url()
                .map(|url| HttpPublisher::new(url, config.http_timeout())),
            pubdir: config.pubdir().map(|root| {
                Pubdir::new(root, config.pubdir_filter(), config.lock_timeout())
            }),
        }
    }

    /// Sets the HTTP sink.
    pub fn with_publisher(mut self, publisher: HttpPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Sets the filesystem sink.
    pub fn with_pubdir(mut self, pubdir: Pubdir) -> Self {
        self.pubdir = Some(pubdir);
        self
    }

    /// Returns true if at least one sink is configured.
    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some() || self.pubdir.is_some()
    }

    /// Records a finished test.
    ///
    /// Returns the result that was published, or `None` if no sink is configured. If the
    /// filesystem sink fails, the HTTP sink still receives the result before the error is
    /// returned.
    pub fn on_test_finished(
        &self,
        finished: &TestFinished,
    ) -> Result<Option<TestResult>, PubdirError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let identity = finished.identity();
        let outcome = finished.outcome.outcome();

        let allocated = match &self.pubdir {
            Some(pubdir) if pubdir.accepts(outcome) => Some(pubdir.allocate(&identity, outcome)),
            Some(pubdir) => {
                debug!(
                    "not writing {outcome} result for `{identity}` (pubdir filter: {})",
                    pubdir.filter(),
                );
                None
            }
            None => None,
        };

        let pubdir_path = match &allocated {
            Some(Ok(allocated)) => Some(allocated.result_dir().to_owned()),
            _ => None,
        };
        let result = TestResult::new(finished, &identity, pubdir_path);

        let written = match (&self.pubdir, allocated) {
            (Some(pubdir), Some(Ok(allocated))) => pubdir.write(allocated, &result).map(|_| ()),
            (_, Some(Err(error))) => Err(error),
            _ => Ok(()),
        };

        if let Some(publisher) = &self.publisher {
            publisher.publish(&result);
        }

        written?;
        Ok(Some(result))
    }
}
