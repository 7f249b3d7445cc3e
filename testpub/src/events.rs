// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading finished-test events, one JSON object per line.

use crate::errors::EventError;
use bytes::Bytes;
use serde::Deserialize;
use testpub_runner::record::{ExcInfo, FinishedOutcome, TestFinished, TestOutcome};

/// Environment variable set by the parallel runner to identify the current worker.
pub(crate) static WORKER_ENV: &str = "PYTEST_XDIST_WORKER";

/// A single input line. Field names match the published record, so `result.json` files can be
/// replayed.
#[derive(Debug, Deserialize)]
struct EventLine {
    nodeid: String,
    result: TestOutcome,
    start_time: f64,
    stop_time: f64,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    log: String,
    #[serde(default)]
    excinfo: Option<ExcInfo>,
    #[serde(default)]
    xdist_worker: Option<String>,
    #[serde(default)]
    xdist_dist: Option<String>,
    #[serde(default)]
    xdist_scope: Option<String>,
}

/// Parses a line into a finished-test event.
///
/// `default_worker` is used if the line doesn't name a worker.
pub(crate) fn parse_event(line: &str, default_worker: Option<&str>) -> Result<TestFinished, EventError> {
    let event: EventLine = serde_json::from_str(line).map_err(EventError::Parse)?;

    let outcome = match (event.result, event.excinfo) {
        (TestOutcome::Pass, _) => FinishedOutcome::Pass,
        (TestOutcome::Fail, Some(exc_info)) => FinishedOutcome::Fail(exc_info),
        (TestOutcome::Skip, Some(exc_info)) => FinishedOutcome::Skip(exc_info),
        (outcome, None) => {
            return Err(EventError::MissingExcInfo {
                node_id: event.nodeid,
                outcome,
            });
        }
    };

    let mut finished = TestFinished::new(event.nodeid, outcome, event.start_time, event.stop_time);
    finished.stdout = Bytes::from(event.stdout);
    finished.stderr = Bytes::from(event.stderr);
    finished.log = Bytes::from(event.log);
    finished.worker_id = event
        .xdist_worker
        .or_else(|| default_worker.map(str::to_owned));
    finished.dist = event.xdist_dist;
    finished.scope_id = event.xdist_scope;

    Ok(finished)
}
