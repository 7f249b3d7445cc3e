// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::write_new_file;
use crate::{
    errors::WriteResultError,
    record::{TestOutcome, TestResult},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use swrite::{SWrite, swriteln};
use tracing::debug;

pub(super) static BRIEF_FILE_NAME: &str = "brief.txt";
pub(super) static RESULT_JSON_FILE_NAME: &str = "result.json";
pub(super) static EXCEPTION_FILE_NAME: &str = "exception.txt";
pub(super) static STDOUT_FILE_NAME: &str = "stdout.txt";
pub(super) static STDERR_FILE_NAME: &str = "stderr.txt";
pub(super) static LOG_FILE_NAME: &str = "log.txt";

const HEADER_WIDTH: usize = 66;

/// Returns the directory a result with the given index and outcome is written to.
pub fn result_dir(identity_dir: &Utf8Path, index: u64, outcome: TestOutcome) -> Utf8PathBuf {
    identity_dir.join(format!("{index}.{outcome}"))
}

/// Materializes `<identity_dir>/<index>.<outcome>/` for a result.
///
/// `index` must have been allocated for `identity_dir` and never used before. The directory is
/// created non-recursively, so an existing result directory is never overwritten.
pub(super) fn write_result_dir(
    identity_dir: &Utf8Path,
    index: u64,
    result: &TestResult,
) -> Result<Utf8PathBuf, WriteResultError> {
    let dir = result_dir(identity_dir, index, result.outcome());
    std::fs::create_dir(&dir).map_err(|error| WriteResultError::DirCreate {
        path: dir.clone(),
        error,
    })?;

    let mut brief = BriefWriter::default();
    brief.header("general test info");
    brief.line(&format!("test: {}", result.node_id()));
    if let Some(scope) = result.scope() {
        brief.line(&format!("xdist-scope: {scope}"));
    }
    brief.line(&format!("result: {}", result.outcome()));
    // Debug formatting always includes a decimal point, e.g. `1.0s`.
    brief.line(&format!("duration: {:?}s", result.duration()));
    if let Some(worker_id) = result.worker_id() {
        brief.line(&format!("xdist-node: {worker_id}"));
    }
    if let Some(dist) = result.dist().filter(|dist| *dist != "no") {
        brief.line(&format!("xdist-dist: {dist}"));
    }

    if let Some(exc_info) = result.exc_info() {
        brief.section(&dir, "exception", EXCEPTION_FILE_NAME, &exc_info.render())?;
    }
    if !result.stdout().is_empty() {
        brief.section(&dir, "stdout", STDOUT_FILE_NAME, result.stdout())?;
    }
    if !result.stderr().is_empty() {
        brief.section(&dir, "stderr", STDERR_FILE_NAME, result.stderr())?;
    }
    if !result.log().is_empty() {
        brief.section(&dir, "log", LOG_FILE_NAME, result.log())?;
    }

    write_file(&dir, BRIEF_FILE_NAME, brief.out.as_bytes())?;

    let json_path = dir.join(RESULT_JSON_FILE_NAME);
    let json = to_json_pretty(result).map_err(|error| WriteResultError::Serialize {
        path: json_path,
        error,
    })?;
    write_file(&dir, RESULT_JSON_FILE_NAME, &json)?;

    debug!("wrote result for `{}` to `{dir}`", result.node_id());
    Ok(dir)
}

fn to_json_pretty(result: &TestResult) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    result.serialize(&mut serializer)?;
    Ok(out)
}

fn write_file(dir: &Utf8Path, name: &str, contents: &[u8]) -> Result<(), WriteResultError> {
    let path = dir.join(name);
    write_new_file(&path, contents).map_err(|error| WriteResultError::FileWrite { path, error })
}

/// Accumulates `brief.txt`, a human-readable summary of a result.
#[derive(Debug, Default)]
struct BriefWriter {
    out: String,
}

impl BriefWriter {
    fn line(&mut self, text: &str) {
        swriteln!(self.out, "{}", text.trim_end());
    }

    fn header(&mut self, title: &str) {
        let line = header_line(title);
        self.line(&line);
    }

    /// Writes a section to the brief, and the same text to its own file.
    fn section(
        &mut self,
        dir: &Utf8Path,
        title: &str,
        file_name: &str,
        text: &str,
    ) -> Result<(), WriteResultError> {
        self.header(title);
        self.line(text);

        let mut contents = text.trim_end().to_owned();
        contents.push('\n');
        write_file(dir, file_name, contents.as_bytes())
    }
}

/// Centers a title in a rule of `=` characters.
fn header_line(title: &str) -> String {
    let width = HEADER_WIDTH.saturating_sub(title.chars().count() + 2);
    if width <= 2 {
        return title.to_owned();
    }

    let left = width.div_ceil(2);
    let right = width / 2;
    format!("{} {title} {}", "=".repeat(left), "=".repeat(right))
}
