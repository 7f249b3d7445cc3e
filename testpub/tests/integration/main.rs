// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that run the testpub binary, several copies at a time.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

mod fixtures;

use fixtures::*;

/// Lists the `<index>.<outcome>` entries of an identity directory.
fn result_dirs(identity_dir: &Utf8Path) -> BTreeSet<String> {
    identity_dir
        .read_dir_utf8()
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_owned())
        .filter(|name| name != "count" && name != ".lock")
        .collect()
}

#[test]
fn concurrent_processes_share_one_counter() {
    const PROCESSES: usize = 8;
    const EVENTS_PER_PROCESS: usize = 5;

    let temp = Utf8TempDir::new().unwrap();
    let pubdir = temp.path().join("pubdir");

    // Every worker runs the same scoped test, so they all contend for one counter.
    let line = serde_json::json!({
        "nodeid": "test_a.py::test_x@group1",
        "result": "pass",
        "start_time": 1000.0,
        "stop_time": 1000.5,
        "xdist_dist": "loadgroup",
    });
    let input = format!("{line}\n").repeat(EVENTS_PER_PROCESS);

    let children: Vec<_> = (0..PROCESSES)
        .map(|worker| {
            TestpubCli::new()
                .env("PYTEST_XDIST_WORKER", &format!("gw{worker}"))
                .args(["--pubdir", pubdir.as_str()])
                .spawn(&input)
        })
        .collect();

    for child in children {
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success(), "{}", output_text(&output));
    }

    let total = PROCESSES * EVENTS_PER_PROCESS;
    let identity_dir = pubdir.join("group1").join("test_x");
    let expected: BTreeSet<_> = (0..total).map(|index| format!("{index}.pass")).collect();
    assert_eq!(result_dirs(&identity_dir), expected);
    assert_eq!(
        std::fs::read_to_string(identity_dir.join("count")).unwrap(),
        total.to_string()
    );

    let workers: BTreeSet<_> = expected
        .iter()
        .map(|name| {
            let json = std::fs::read_to_string(identity_dir.join(name).join("result.json")).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["xdist_scope"], "group1");
            value["xdist_worker"].as_str().unwrap().to_owned()
        })
        .collect();
    assert_eq!(workers.len(), PROCESSES, "every worker wrote results");
}

#[test]
fn unreachable_publish_url_does_not_fail() {
    let temp = Utf8TempDir::new().unwrap();
    let pubdir = temp.path().join("pubdir");
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let url = format!("http://{addr}/test-update");

    let input = event_line("test_a.py::test_one", "fail");
    let output = TestpubCli::new()
        .args([
            "--publish",
            &url,
            "--http-timeout",
            "2s",
            "--pubdir",
            pubdir.as_str(),
        ])
        .output(&input);
    assert!(output.status.success(), "{}", output_text(&output));

    let result_dir = pubdir.join("test_a.py::test_one").join("0.fail");
    let exception = std::fs::read_to_string(result_dir.join("exception.txt")).unwrap();
    assert_eq!(exception, "test.py:2: in test\nAssertionError: assert False\n");
    assert_eq!(
        std::fs::read_to_string(result_dir.join("stdout.txt")).unwrap(),
        "some output\n"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: error posting result"), "{stderr}");
}

#[test]
fn pubdir_filter_from_config_file() {
    let temp = Utf8TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".config")).unwrap();
    std::fs::write(
        temp.path().join(".config/testpub.toml"),
        "pubdir = \"out\"\npubdir-filter = \"fail\"\n",
    )
    .unwrap();

    let input = [
        event_line("t.py::a", "pass"),
        event_line("t.py::a", "skip"),
        event_line("t.py::a", "fail"),
    ]
    .concat();
    let output = TestpubCli::new().current_dir(temp.path()).output(&input);
    assert!(output.status.success(), "{}", output_text(&output));

    let identity_dir = temp.path().join("out").join("t.py::a");
    assert_eq!(
        result_dirs(&identity_dir),
        BTreeSet::from(["0.fail".to_owned()])
    );
}

#[test]
fn malformed_input_fails() {
    let temp = Utf8TempDir::new().unwrap();
    let pubdir = temp.path().join("pubdir");

    let input = format!("{}{{not json\n", event_line("t.py::a", "pass"));
    let output = TestpubCli::new()
        .args(["--pubdir", pubdir.as_str()])
        .output(&input);
    assert_eq!(output.status.code(), Some(94), "{}", output_text(&output));

    // The line before the bad one was still published.
    assert!(pubdir.join("t.py::a").join("0.pass").is_dir());
}

#[test]
fn corrupt_counter_fails() {
    let temp = Utf8TempDir::new().unwrap();
    let pubdir = temp.path().join("pubdir");
    let identity_dir = pubdir.join("t.py::a");
    std::fs::create_dir_all(&identity_dir).unwrap();
    std::fs::write(identity_dir.join("count"), "twelve").unwrap();

    let output = TestpubCli::new()
        .args(["--pubdir", pubdir.as_str()])
        .output(&event_line("t.py::a", "pass"));
    assert_eq!(output.status.code(), Some(104), "{}", output_text(&output));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is corrupt"), "{stderr}");
}
