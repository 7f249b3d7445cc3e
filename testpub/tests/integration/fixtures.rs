// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use std::{
    io::Write,
    process::{Child, Command, Output, Stdio},
};

/// Builds an invocation of the testpub binary under test.
pub(crate) struct TestpubCli {
    command: Command,
}

impl TestpubCli {
    pub(crate) fn new() -> Self {
        let mut command = Command::new(env!("CARGO_BIN_EXE_testpub"));
        command
            .env_remove("PYTEST_XDIST_WORKER")
            .env_remove("TESTPUB_LOG")
            .env_remove("TESTPUB_PUBLISH")
            .env_remove("TESTPUB_PUBDIR")
            .env("CARGO_TERM_COLOR", "never")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Self { command }
    }

    pub(crate) fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.command.current_dir(dir);
        self
    }

    pub(crate) fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    pub(crate) fn args<'a>(mut self, args: impl IntoIterator<Item = &'a str>) -> Self {
        self.command.args(args);
        self
    }

    /// Spawns the process and writes `input` to its stdin.
    pub(crate) fn spawn(mut self, input: &str) -> Child {
        let mut child = self.command.spawn().expect("testpub spawned");
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin.write_all(input.as_bytes()).expect("wrote to stdin");
        child
    }

    pub(crate) fn output(self, input: &str) -> Output {
        self.spawn(input).wait_with_output().expect("testpub ran")
    }
}

/// Returns a JSON event line.
pub(crate) fn event_line(node_id: &str, result: &str) -> String {
    let mut event = serde_json::json!({
        "nodeid": node_id,
        "result": result,
        "start_time": 1000.0,
        "stop_time": 1000.5,
        "stdout": "some output\n",
    });
    if result != "pass" {
        event["excinfo"] = serde_json::json!({
            "type": "AssertionError",
            "value": "assert False",
            "traceback": ["test.py:2: in test\n"],
        });
    }
    let mut line = event.to_string();
    line.push('\n');
    line
}

pub(crate) fn output_text(output: &Output) -> String {
    format!(
        "status: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    )
}
