// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test identities: node IDs, bare names and load-group scopes.

use std::fmt;

/// Separator between the components of a node ID, e.g. `tests/test_a.py::TestCase::test_one`.
pub const NODE_ID_SEPARATOR: &str = "::";

/// Separator between a test and the load group it was assigned to, e.g. `test_one@group1`.
pub const SCOPE_SEPARATOR: char = '@';

/// The distribution mode under which tests are grouped into scopes by node ID suffix.
pub const LOADGROUP_DIST: &str = "loadgroup";

/// The identity of a single finished test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestIdentity {
    node_id: String,
    name: String,
    scope: Option<String>,
}

impl TestIdentity {
    /// Creates a new identity.
    ///
    /// An explicit `scope_id` always wins. Otherwise, if the worker distributes tests with
    /// [`LOADGROUP_DIST`], the scope is derived from the `@<scope>` suffix of the node ID.
    pub fn new(node_id: impl Into<String>, scope_id: Option<&str>, dist: Option<&str>) -> Self {
        let node_id = node_id.into();

        let scope = match scope_id {
            Some(scope) => Some(scope.to_owned()),
            None if dist == Some(LOADGROUP_DIST) => {
                split_loadgroup_scope(&node_id).map(|(_, scope)| scope.to_owned())
            }
            None => None,
        };

        let name = if scope.is_some() {
            bare_test_name(&node_id)
        } else {
            last_component(&node_id)
        }
        .to_owned();

        Self {
            node_id,
            name,
            scope,
        }
    }

    /// The fully-qualified node ID.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The test's name: the last component of the node ID, without any scope suffix if the test
    /// is scoped.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope this test was grouped into, if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{} (scope {scope})", self.node_id),
            None => write!(f, "{}", self.node_id),
        }
    }
}

/// Splits a load-group node ID such as `test_a.py::test_x@group1` into the test part and the
/// scope.
///
/// Returns `None` if there's no scope suffix. An `@` inside a parametrization such as
/// `test_x[a@b]`, or inside a module path, is not a scope separator.
pub fn split_loadgroup_scope(node_id: &str) -> Option<(&str, &str)> {
    let idx = scope_separator_index(node_id)?;
    let scope = &node_id[idx + SCOPE_SEPARATOR.len_utf8()..];
    if scope.contains(NODE_ID_SEPARATOR) {
        return None;
    }
    Some((&node_id[..idx], scope))
}

/// Returns the last component of the node ID, with any load-group suffix removed.
pub fn bare_test_name(node_id: &str) -> &str {
    let name = last_component(node_id);
    match scope_separator_index(name) {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// The index of the last `@`, unless it's followed by the closing `]` of a parametrization.
fn scope_separator_index(s: &str) -> Option<usize> {
    let idx = s.rfind(SCOPE_SEPARATOR)?;
    match s.rfind(']') {
        Some(bracket) if bracket > idx => None,
        _ => Some(idx),
    }
}

fn last_component(node_id: &str) -> &str {
    node_id
        .rsplit(NODE_ID_SEPARATOR)
        .next()
        .unwrap_or(node_id)
}
