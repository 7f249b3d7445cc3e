// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result, TestpubExitCode},
    events::{WORKER_ENV, parse_event},
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::{
    io::{self, BufRead, BufReader},
    time::Duration,
};
use testpub_runner::{
    collector::SessionCollector,
    config::{PublishConfig, PublishOverrides},
    pubdir::PubdirFilter,
};
use tracing::{debug, info, warn};

/// Publish finished-test events to an HTTP endpoint and a result directory tree.
///
/// Events are read as newline-delimited JSON objects, one per finished test, with the same field
/// names as the published records.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct TestpubApp {
    /// URL to POST each result to, as JSON
    #[arg(long, value_name = "URL", env = "TESTPUB_PUBLISH")]
    publish: Option<String>,

    /// Root of the result directory tree
    #[arg(long, value_name = "PATH", env = "TESTPUB_PUBDIR")]
    pubdir: Option<Utf8PathBuf>,

    /// Which results to write to the result directory: all, bad, fail
    #[arg(long, value_name = "FILTER")]
    pubdir_filter: Option<PubdirFilter>,

    /// Config file [default: .config/testpub.toml in the current directory, if present]
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// How long to wait for another process to release a counter lock
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    lock_timeout: Option<Duration>,

    /// Timeout for each HTTP request
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    http_timeout: Option<Duration>,

    #[clap(flatten)]
    output: OutputOpts,

    /// File to read events from, or `-` for standard input
    #[arg(value_name = "INPUT", default_value = "-")]
    input: Utf8PathBuf,
}

impl TestpubApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self) -> Result<i32> {
        let current_dir = std::env::current_dir()
            .and_then(|dir| Utf8PathBuf::try_from(dir).map_err(|err| err.into_io_error()))
            .map_err(|err| ExpectedError::CurrentDirInvalid { err })?;

        let mut config = PublishConfig::from_sources(
            &current_dir,
            self.config.as_deref(),
            |config_file, unknown| {
                warn!(
                    "ignoring unknown configuration keys in `{config_file}`: {}",
                    unknown.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
                );
            },
        )?;
        config.apply_overrides(PublishOverrides {
            publish_url: self.publish,
            pubdir: self.pubdir,
            pubdir_filter: self.pubdir_filter,
            lock_timeout: self.lock_timeout,
            http_timeout: self.http_timeout,
        });

        let collector = SessionCollector::from_config(&config);
        if !collector.is_enabled() {
            warn!("neither --publish nor --pubdir is set: events will be read but not published");
        }

        let default_worker = std::env::var(WORKER_ENV).ok();
        let count = publish_events(&self.input, &collector, default_worker.as_deref())?;

        info!("published {count} {}", if count == 1 { "result" } else { "results" });
        Ok(TestpubExitCode::OK)
    }
}

/// Reads events from `input` and hands each one to the collector. Returns the number of events
/// read.
fn publish_events(
    input: &Utf8Path,
    collector: &SessionCollector,
    default_worker: Option<&str>,
) -> Result<usize> {
    let (name, reader): (String, Box<dyn BufRead>) = if input == "-" {
        ("standard input".to_owned(), Box::new(io::stdin().lock()))
    } else {
        let file = std::fs::File::open(input).map_err(|err| ExpectedError::InputOpenError {
            path: input.to_owned(),
            err,
        })?;
        (format!("`{input}`"), Box::new(BufReader::new(file)))
    };

    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| ExpectedError::InputReadError {
            input: name.clone(),
            err,
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let finished =
            parse_event(line, default_worker).map_err(|err| ExpectedError::EventError {
                input: name.clone(),
                line_number: index + 1,
                err,
            })?;

        if let Some(result) = collector.on_test_finished(&finished)? {
            match result.pubdir_path() {
                Some(path) => debug!("{} `{}` -> `{path}`", result.outcome(), result.node_id()),
                None => debug!("{} `{}`", result.outcome(), result.node_id()),
            }
        }
        count += 1;
    }

    Ok(count)
}
