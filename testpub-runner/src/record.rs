// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result records: the normalized shape of a single test outcome.
//!
//! A [`TestResult`] is built once from the raw data a test runner hands over in a
//! [`TestFinished`], and serializes to the same JSON shape whether it is posted to an HTTP
//! endpoint or written out as `result.json`.

use crate::identity::TestIdentity;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use swrite::{SWrite, swrite};
use tracing::warn;

/// The outcome of a single test.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum TestOutcome {
    /// The test passed.
    Pass,

    /// The test failed.
    Fail,

    /// The test was skipped.
    Skip,
}

impl TestOutcome {
    /// Returns the string used for this outcome on the wire and in directory names.
    pub fn as_str(self) -> &'static str {
        match self {
            TestOutcome::Pass => "pass",
            TestOutcome::Fail => "fail",
            TestOutcome::Skip => "skip",
        }
    }

    /// Returns true if this is a passing outcome.
    pub fn is_pass(self) -> bool {
        self == TestOutcome::Pass
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of event a record describes. Only results exist today.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A test result.
    #[default]
    Result,
}

/// Information about the exception that made a test fail or skip.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExcInfo {
    /// The exception's type name, e.g. `AssertionError`.
    #[serde(rename = "type")]
    pub exc_type: String,

    /// The exception's message. May be empty.
    pub value: String,

    /// Formatted traceback entries, outermost first.
    pub traceback: Vec<String>,
}

impl ExcInfo {
    /// Renders the traceback followed by the `type: value` line.
    pub fn render(&self) -> String {
        let mut out = self.traceback.concat();
        if self.value.is_empty() {
            out.push_str(&self.exc_type);
        } else {
            swrite!(out, "{}: {}", self.exc_type, self.value);
        }
        out
    }
}

/// The outcome of a finished test as reported by the runner.
///
/// Non-passing outcomes always carry the exception that caused them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishedOutcome {
    /// The test passed.
    Pass,

    /// The test was skipped.
    Skip(ExcInfo),

    /// The test failed.
    Fail(ExcInfo),
}

impl FinishedOutcome {
    /// Returns the outcome classification.
    pub fn outcome(&self) -> TestOutcome {
        match self {
            FinishedOutcome::Pass => TestOutcome::Pass,
            FinishedOutcome::Skip(_) => TestOutcome::Skip,
            FinishedOutcome::Fail(_) => TestOutcome::Fail,
        }
    }

    /// Returns the exception information, if the test did not pass.
    pub fn exc_info(&self) -> Option<&ExcInfo> {
        match self {
            FinishedOutcome::Pass => None,
            FinishedOutcome::Skip(exc_info) | FinishedOutcome::Fail(exc_info) => Some(exc_info),
        }
    }
}

/// Raw data about a finished test, as supplied by the test runner.
#[derive(Clone, Debug)]
pub struct TestFinished {
    /// The fully-qualified node ID of the test.
    pub node_id: String,

    /// What happened.
    pub outcome: FinishedOutcome,

    /// Start time, in seconds since the Unix epoch.
    pub start_time: f64,

    /// Stop time, in seconds since the Unix epoch.
    pub stop_time: f64,

    /// Captured standard output.
    pub stdout: Bytes,

    /// Captured standard error.
    pub stderr: Bytes,

    /// Captured log text.
    pub log: Bytes,

    /// The parallel worker that ran this test, if any.
    pub worker_id: Option<String>,

    /// The worker's distribution mode (e.g. `load` or `loadgroup`), if any.
    pub dist: Option<String>,

    /// The scope the runner grouped this test into, if any.
    pub scope_id: Option<String>,
}

impl TestFinished {
    /// Creates a new `TestFinished` with no captured output and no worker information.
    pub fn new(
        node_id: impl Into<String>,
        outcome: FinishedOutcome,
        start_time: f64,
        stop_time: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            outcome,
            start_time,
            stop_time,
            stdout: Bytes::new(),
            stderr: Bytes::new(),
            log: Bytes::new(),
            worker_id: None,
            dist: None,
            scope_id: None,
        }
    }

    /// Computes the identity of this test.
    pub fn identity(&self) -> TestIdentity {
        TestIdentity::new(
            self.node_id.clone(),
            self.scope_id.as_deref(),
            self.dist.as_deref(),
        )
    }
}

/// A normalized test result.
///
/// This is the JSON payload posted to HTTP endpoints and written to `result.json`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TestResult {
    #[serde(rename = "type")]
    kind: RecordKind,
    result: TestOutcome,
    nodeid: String,
    name: String,
    start_time: f64,
    stop_time: f64,
    duration: f64,
    stdout: String,
    stderr: String,
    log: String,
    xdist_dist: Option<String>,
    xdist_worker: Option<String>,
    xdist_scope: Option<String>,
    pubdir_path: Option<Utf8PathBuf>,
    excinfo: Option<ExcInfo>,
}

impl TestResult {
    /// Builds a result from what the runner reported.
    ///
    /// `pubdir_path` is the result directory the filesystem sink is writing this result to, if
    /// any.
    pub fn new(
        finished: &TestFinished,
        identity: &TestIdentity,
        pubdir_path: Option<Utf8PathBuf>,
    ) -> Self {
        let start_time = finished.start_time;
        let stop_time = if finished.stop_time < start_time {
            warn!(
                "test `{}` reported stop time {} before start time {start_time}, clamping",
                identity.node_id(),
                finished.stop_time,
            );
            start_time
        } else {
            finished.stop_time
        };

        Self {
            kind: RecordKind::Result,
            result: finished.outcome.outcome(),
            nodeid: identity.node_id().to_owned(),
            name: identity.name().to_owned(),
            start_time,
            stop_time,
            duration: stop_time - start_time,
            stdout: decode_lossy(&finished.stdout),
            stderr: decode_lossy(&finished.stderr),
            log: decode_lossy(&finished.log),
            xdist_dist: finished.dist.clone(),
            xdist_worker: finished.worker_id.clone(),
            xdist_scope: identity.scope().map(ToOwned::to_owned),
            pubdir_path,
            excinfo: finished.outcome.exc_info().cloned(),
        }
    }

    /// The outcome of the test.
    pub fn outcome(&self) -> TestOutcome {
        self.result
    }

    /// The node ID of the test.
    pub fn node_id(&self) -> &str {
        &self.nodeid
    }

    /// The test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start time in seconds since the epoch.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Stop time in seconds since the epoch.
    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Captured standard output.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Captured log text.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// The worker's distribution mode.
    pub fn dist(&self) -> Option<&str> {
        self.xdist_dist.as_deref()
    }

    /// The worker that ran the test.
    pub fn worker_id(&self) -> Option<&str> {
        self.xdist_worker.as_deref()
    }

    /// The scope of the test.
    pub fn scope(&self) -> Option<&str> {
        self.xdist_scope.as_deref()
    }

    /// The result directory written for this test, if any.
    pub fn pubdir_path(&self) -> Option<&Utf8Path> {
        self.pubdir_path.as_deref()
    }

    /// Exception information. Present if and only if the test did not pass.
    pub fn exc_info(&self) -> Option<&ExcInfo> {
        self.excinfo.as_ref()
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
