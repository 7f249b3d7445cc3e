// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result directory ("pubdir") sink.
//!
//! Results are aggregated on disk under a root directory, one identity directory per test:
//!
//! ```text
//! <root>/<node id>/.lock
//! <root>/<node id>/count
//! <root>/<node id>/<index>.<outcome>/brief.txt
//! <root>/<node id>/<index>.<outcome>/result.json
//! <root>/<node id>/<index>.<outcome>/{exception,stdout,stderr,log}.txt
//! ```
//!
//! Scoped tests are placed under `<root>/<scope>/<test name>/` instead. Indexes within an
//! identity directory are allocated under a file lock, so they are unique and gap-free even with
//! several worker processes writing at once.

mod counter;
mod path;
mod writer;

pub use counter::IndexCounter;
pub use path::{IdentityPath, sanitize_segment};
pub use writer::result_dir;

use crate::{
    errors::PubdirError,
    identity::TestIdentity,
    record::{TestOutcome, TestResult},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{fmt, io, io::Write, str::FromStr, time::Duration};

/// Which results are written to the result directory.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PubdirFilter {
    /// Every result.
    #[default]
    All,

    /// Results that did not pass.
    Bad,

    /// Failed results only.
    Fail,
}

impl PubdirFilter {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["all", "bad", "fail"]
    }

    /// Returns true if a result with this outcome should be written.
    pub fn accepts(self, outcome: TestOutcome) -> bool {
        match self {
            PubdirFilter::All => true,
            PubdirFilter::Bad => outcome != TestOutcome::Pass,
            PubdirFilter::Fail => outcome == TestOutcome::Fail,
        }
    }
}

impl fmt::Display for PubdirFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PubdirFilter::All => write!(f, "all"),
            PubdirFilter::Bad => write!(f, "bad"),
            PubdirFilter::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for PubdirFilter {
    type Err = crate::errors::PubdirFilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PubdirFilter::All),
            "bad" => Ok(PubdirFilter::Bad),
            "fail" => Ok(PubdirFilter::Fail),
            other => Err(crate::errors::PubdirFilterParseError::new(other)),
        }
    }
}

/// A result directory tree.
#[derive(Clone, Debug)]
pub struct Pubdir {
    root: Utf8PathBuf,
    filter: PubdirFilter,
    lock_timeout: Duration,
}

impl Pubdir {
    /// Creates a new `Pubdir` rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>, filter: PubdirFilter, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            filter,
            lock_timeout,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The filter applied to results.
    pub fn filter(&self) -> PubdirFilter {
        self.filter
    }

    /// Returns true if a result with this outcome is written to this tree.
    pub fn accepts(&self, outcome: TestOutcome) -> bool {
        self.filter.accepts(outcome)
    }

    /// Resolves the identity directory for a test and allocates the next index in it.
    pub fn allocate(
        &self,
        identity: &TestIdentity,
        outcome: TestOutcome,
    ) -> Result<AllocatedResult, PubdirError> {
        let path = IdentityPath::resolve(&self.root, identity.node_id(), identity.scope());
        let counter = IndexCounter::new(path.identity_dir(), self.lock_timeout);
        let index = counter
            .allocate_next()
            .map_err(|error| PubdirError::Allocate {
                identity_dir: path.identity_dir().to_owned(),
                error,
            })?;

        Ok(AllocatedResult {
            result_dir: result_dir(path.identity_dir(), index, outcome),
            path,
            index,
            outcome,
        })
    }

    /// Writes a result into the slot previously returned by [`Self::allocate`].
    ///
    /// Consumes the allocation, so a slot can only be written once. The result's outcome must
    /// match the outcome the slot was allocated for.
    pub fn write(
        &self,
        allocated: AllocatedResult,
        result: &TestResult,
    ) -> Result<Utf8PathBuf, PubdirError> {
        let AllocatedResult {
            path,
            index,
            outcome,
            ..
        } = allocated;
        if result.outcome() != outcome {
            return Err(PubdirError::OutcomeMismatch {
                identity_dir: path.identity_dir().to_owned(),
                index,
                allocated: outcome,
                actual: result.outcome(),
            });
        }

        writer::write_result_dir(path.identity_dir(), index, result).map_err(|error| {
            PubdirError::Write {
                identity_dir: path.identity_dir().to_owned(),
                index,
                error,
            }
        })
    }
}

/// An index that has been allocated for a result, but not written yet.
#[derive(Debug)]
#[must_use = "an allocated index must be written to avoid a gap"]
pub struct AllocatedResult {
    path: IdentityPath,
    index: u64,
    outcome: TestOutcome,
    result_dir: Utf8PathBuf,
}

impl AllocatedResult {
    /// The identity directory.
    pub fn identity_dir(&self) -> &Utf8Path {
        self.path.identity_dir()
    }

    /// The allocated index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The outcome the index was allocated for.
    pub fn outcome(&self) -> TestOutcome {
        self.outcome
    }

    /// The `<index>.<outcome>` directory the result will be written to.
    pub fn result_dir(&self) -> &Utf8Path {
        &self.result_dir
    }
}

/// Writes a file atomically, failing if it already exists.
fn write_new_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    write_atomic(path, contents, atomicwrites::DisallowOverwrite)
}

/// Writes a file atomically, replacing any existing contents.
fn replace_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    write_atomic(path, contents, atomicwrites::AllowOverwrite)
}

fn write_atomic(
    path: &Utf8Path,
    contents: &[u8],
    overwrite: atomicwrites::OverwriteBehavior,
) -> io::Result<()> {
    atomicwrites::AtomicFile::new(path, overwrite)
        .write(|file| file.write_all(contents))
        .map_err(|error| match error {
            atomicwrites::Error::Internal(error) | atomicwrites::Error::User(error) => error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FinishedOutcome, TestFinished};
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(PubdirFilter::All, TestOutcome::Pass, true)]
    #[test_case(PubdirFilter::All, TestOutcome::Skip, true)]
    #[test_case(PubdirFilter::Bad, TestOutcome::Pass, false)]
    #[test_case(PubdirFilter::Bad, TestOutcome::Skip, true)]
    #[test_case(PubdirFilter::Bad, TestOutcome::Fail, true)]
    #[test_case(PubdirFilter::Fail, TestOutcome::Skip, false)]
    #[test_case(PubdirFilter::Fail, TestOutcome::Fail, true)]
    fn filter_accepts(filter: PubdirFilter, outcome: TestOutcome, expected: bool) {
        assert_eq!(filter.accepts(outcome), expected);
    }

    #[test]
    fn filter_from_str() {
        for variant in PubdirFilter::variants() {
            let filter: PubdirFilter = variant.parse().unwrap();
            assert_eq!(filter.to_string(), *variant);
        }
        assert!("some".parse::<PubdirFilter>().is_err());
    }

    #[test]
    fn allocate_then_write() {
        let temp = Utf8TempDir::new().unwrap();
        let pubdir = Pubdir::new(temp.path(), PubdirFilter::All, Duration::from_secs(5));
        let finished = TestFinished::new("test_a::test_one", FinishedOutcome::Pass, 0.0, 1.0);
        let identity = finished.identity();

        for expected in 0..2 {
            let allocated = pubdir.allocate(&identity, TestOutcome::Pass).unwrap();
            assert_eq!(allocated.index(), expected);
            assert_eq!(
                allocated.result_dir(),
                temp.path()
                    .join("test_a::test_one")
                    .join(format!("{expected}.pass")),
            );

            let result = TestResult::new(
                &finished,
                &identity,
                Some(allocated.result_dir().to_owned()),
            );
            let written = pubdir.write(allocated, &result).unwrap();
            assert!(written.join("result.json").is_file());
        }

        assert_eq!(
            std::fs::read_to_string(temp.path().join("test_a::test_one").join("count")).unwrap(),
            "2"
        );
    }

    #[test]
    fn write_rejects_a_different_outcome() {
        let temp = Utf8TempDir::new().unwrap();
        let pubdir = Pubdir::new(temp.path(), PubdirFilter::All, Duration::from_secs(5));
        let finished = TestFinished::new("a::b", FinishedOutcome::Pass, 0.0, 1.0);
        let identity = finished.identity();

        let allocated = pubdir.allocate(&identity, TestOutcome::Fail).unwrap();
        let result_dir = allocated.result_dir().to_owned();
        let result = TestResult::new(&finished, &identity, Some(result_dir.clone()));

        let error = pubdir.write(allocated, &result).unwrap_err();
        assert!(
            matches!(
                error,
                PubdirError::OutcomeMismatch {
                    index: 0,
                    allocated: TestOutcome::Fail,
                    actual: TestOutcome::Pass,
                    ..
                }
            ),
            "unexpected error: {error:?}"
        );
        assert!(!result_dir.exists());
        assert!(!temp.path().join("a::b").join("0.pass").exists());
    }
}
