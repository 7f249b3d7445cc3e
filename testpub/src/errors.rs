// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use testpub_runner::{
    errors::{ConfigParseError, PubdirError},
    record::TestOutcome,
};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for testpub failures.
///
/// Unknown/unexpected failures result in exit code 1.
pub enum TestpubExitCode {}

impl TestpubExitCode {
    /// Every event was read and published.
    pub const OK: i32 = 0;

    /// An error occurred before reading events, e.g. while parsing config.
    pub const SETUP_ERROR: i32 = 96;

    /// An input line could not be read or parsed.
    pub const INVALID_INPUT: i32 = 94;

    /// Writing to the result directory failed.
    pub const PUBDIR_FAILED: i32 = 104;
}

/// An error with a finished-test event line.
#[derive(Debug, Error)]
pub enum EventError {
    /// The line is not a valid event.
    #[error("invalid JSON event")]
    Parse(#[source] serde_json::Error),

    /// A test that didn't pass carries no exception information.
    #[error("{outcome} event for `{node_id}` has no `excinfo`")]
    MissingExcInfo {
        /// The test.
        node_id: String,

        /// The test's outcome.
        outcome: TestOutcome,
    },
}

// The #[error()] strings are placeholders: errors are printed with display_to_stderr.

/// An error that ends the run.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("current directory is invalid")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to open input")]
    InputOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read input")]
    InputReadError {
        input: String,
        #[source]
        err: std::io::Error,
    },
    #[error("invalid event")]
    EventError {
        input: String,
        line_number: usize,
        #[source]
        err: EventError,
    },
    #[error("failed to write to result directory")]
    PubdirError {
        #[from]
        err: PubdirError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::InputOpenError { .. } => TestpubExitCode::SETUP_ERROR,
            Self::InputReadError { .. } | Self::EventError { .. } => {
                TestpubExitCode::INVALID_INPUT
            }
            Self::PubdirError { .. } => TestpubExitCode::PUBDIR_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirInvalid { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::InputOpenError { path, err } => {
                error!("failed to open input `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::InputReadError { input, err } => {
                error!("failed to read from {input}");
                Some(err as &dyn Error)
            }
            Self::EventError {
                input,
                line_number,
                err,
            } => {
                error!("{input}:{line_number}: {err}");
                err.source()
            }
            Self::PubdirError { err } => {
                error!("{err}");
                err.source()
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
