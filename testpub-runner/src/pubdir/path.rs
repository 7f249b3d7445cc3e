// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::identity::bare_test_name;
use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;

/// Replaces characters that could escape a single path segment.
///
/// Path separators and NUL become `_`, and segments that would be interpreted specially
/// (empty, `.` and `..`) are prefixed with `_`.
pub fn sanitize_segment(raw: &str) -> Cow<'_, str> {
    let needs_escape = |ch: char| matches!(ch, '/' | '\\' | '\0');

    let segment: Cow<'_, str> = if raw.contains(needs_escape) {
        Cow::Owned(raw.replace(needs_escape, "_"))
    } else {
        Cow::Borrowed(raw)
    };

    match &*segment {
        "" | "." | ".." => Cow::Owned(format!("_{segment}")),
        _ => segment,
    }
}

/// The directory a test's results are aggregated under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityPath {
    identity_dir: Utf8PathBuf,
    leaf_name: String,
}

impl IdentityPath {
    /// Computes the identity directory for a test.
    ///
    /// Without a scope this is `root/<node_id>`. With a scope it's
    /// `root/<scope_id>/<bare test name>`. Each component is sanitized so the result always lies
    /// inside `root`.
    pub fn resolve(root: &Utf8Path, node_id: &str, scope_id: Option<&str>) -> Self {
        match scope_id {
            Some(scope_id) => {
                let leaf_name = sanitize_segment(bare_test_name(node_id)).into_owned();
                let identity_dir = root.join(&*sanitize_segment(scope_id)).join(&leaf_name);
                Self {
                    identity_dir,
                    leaf_name,
                }
            }
            None => {
                let leaf_name = sanitize_segment(node_id).into_owned();
                Self {
                    identity_dir: root.join(&leaf_name),
                    leaf_name,
                }
            }
        }
    }

    /// The identity directory.
    pub fn identity_dir(&self) -> &Utf8Path {
        &self.identity_dir
    }

    /// The last component of the identity directory, i.e. the test's name without any scope.
    pub fn leaf_name(&self) -> &str {
        &self.leaf_name
    }
}
