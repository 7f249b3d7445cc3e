// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testpub.

use crate::record::TestOutcome;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt, time::Duration};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse testpub config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// Error returned while parsing a [`PubdirFilter`](crate::pubdir::PubdirFilter) value from a
/// string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for pubdir filter: {input}\n(known values: {})",
    crate::pubdir::PubdirFilter::variants().join(", "),
)]
pub struct PubdirFilterParseError {
    input: String,
}

impl PubdirFilterParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while allocating the next result index for a test.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocateError {
    /// The identity directory could not be created.
    #[error("error creating identity directory `{path}`")]
    DirCreate {
        /// The directory that could not be created.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The lock file could not be opened.
    #[error("error opening lock file `{path}`")]
    LockOpen {
        /// The lock file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The lock is held by someone else and did not become available in time.
    #[error(
        "timed out after {}s waiting for lock `{path}`",
        timeout.as_secs_f64()
    )]
    LockTimeout {
        /// The lock file.
        path: Utf8PathBuf,

        /// How long we waited for.
        timeout: Duration,
    },

    /// Locking failed for a reason other than contention.
    #[error("error acquiring lock `{path}`")]
    Lock {
        /// The lock file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The counter file exists but could not be read.
    #[error("error reading counter file `{path}`")]
    CounterRead {
        /// The counter file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The counter file does not hold a non-negative integer.
    #[error("counter file `{path}` is corrupt (contents: {contents:?})")]
    CounterParse {
        /// The counter file.
        path: Utf8PathBuf,

        /// What was found in the file.
        contents: String,
    },

    /// The incremented counter could not be persisted.
    #[error("error writing counter file `{path}`")]
    CounterWrite {
        /// The counter file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while materializing a result directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteResultError {
    /// The `<index>.<outcome>` directory could not be created. This includes the case where it
    /// already exists.
    #[error("error creating result directory `{path}`")]
    DirCreate {
        /// The result directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A file inside the result directory could not be written.
    #[error("error writing `{path}`")]
    FileWrite {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The result record could not be serialized.
    #[error("error serializing result for `{path}`")]
    Serialize {
        /// The file the serialized record was destined for.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error from the filesystem sink.
///
/// Unlike HTTP publishing failures, these are returned to the caller: a half-written result tree
/// is worse than a loud failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PubdirError {
    /// Allocating an index failed.
    #[error("failed to allocate result index in `{identity_dir}`")]
    Allocate {
        /// The identity directory.
        identity_dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: AllocateError,
    },

    /// Writing the result directory failed.
    #[error("failed to write result {index} in `{identity_dir}`")]
    Write {
        /// The identity directory.
        identity_dir: Utf8PathBuf,

        /// The index that was allocated for this result.
        index: u64,

        /// The underlying error.
        #[source]
        error: WriteResultError,
    },

    /// A result was written to an index allocated for a different outcome.
    #[error(
        "result {index} in `{identity_dir}` was allocated for outcome `{allocated}`, \
         but the result's outcome is `{actual}`"
    )]
    OutcomeMismatch {
        /// The identity directory.
        identity_dir: Utf8PathBuf,

        /// The allocated index.
        index: u64,

        /// The outcome the index was allocated for.
        allocated: TestOutcome,

        /// The outcome of the result being written.
        actual: TestOutcome,
    },
}

/// An error that occurred while publishing a result over HTTP.
///
/// These never escape the publisher; they are only logged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    /// The record could not be serialized.
    #[error("error serializing result for `{url}`")]
    Serialize {
        /// The endpoint.
        url: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The request failed or returned a non-success status.
    #[error("error posting result to `{url}`")]
    Transport {
        /// The endpoint.
        url: String,

        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },
}

/// Displays an error along with its chain of causes.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new chain display for the given error.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_none() {
            return Ok(());
        }

        write!(f, "\n  caused by:")?;
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
