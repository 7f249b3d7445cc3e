// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for testpub.
//!
//! Configuration is layered: the embedded default config, then an optional TOML file, then
//! overrides (typically from the command line).

use crate::{errors::ConfigParseError, pubdir::PubdirFilter};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};

/// Overall configuration for publishing results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishConfig {
    publish_url: Option<String>,
    pubdir: Option<Utf8PathBuf>,
    pubdir_filter: PubdirFilter,
    lock_timeout: Duration,
    http_timeout: Duration,
}

impl PublishConfig {
    /// The default config, embedded in the binary.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The config file looked up relative to the working directory if none is specified.
    pub const CONFIG_PATH: &'static str = ".config/testpub.toml";

    /// Reads the config from the embedded defaults and a config file.
    ///
    /// If `file` is specified, it must exist. Otherwise [`Self::CONFIG_PATH`] is read relative
    /// to `base_dir` if it exists.
    ///
    /// `unknown_callback` is called with the config file and the set of keys that weren't
    /// recognized, if any.
    pub fn from_sources(
        base_dir: &Utf8Path,
        file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = base_dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|error| ConfigParseError::new(&config_file, error))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        Ok(config.into_config())
    }

    /// Returns the config with only the embedded defaults applied.
    pub fn default_config() -> Self {
        let (config, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        config.into_config()
    }

    /// Applies overrides on top of this config.
    pub fn apply_overrides(&mut self, overrides: PublishOverrides) {
        let PublishOverrides {
            publish_url,
            pubdir,
            pubdir_filter,
            lock_timeout,
            http_timeout,
        } = overrides;

        if let Some(publish_url) = publish_url {
            self.publish_url = Some(publish_url);
        }
        if let Some(pubdir) = pubdir {
            self.pubdir = Some(pubdir);
        }
        if let Some(pubdir_filter) = pubdir_filter {
            self.pubdir_filter = pubdir_filter;
        }
        if let Some(lock_timeout) = lock_timeout {
            self.lock_timeout = lock_timeout;
        }
        if let Some(http_timeout) = http_timeout {
            self.http_timeout = http_timeout;
        }
    }

    /// The URL results are posted to, if any.
    pub fn publish_url(&self) -> Option<&str> {
        self.publish_url.as_deref()
    }

    /// The root of the result directory tree, if any.
    pub fn pubdir(&self) -> Option<&Utf8Path> {
        self.pubdir.as_deref()
    }

    /// Which results are written to the pubdir.
    pub fn pubdir_filter(&self) -> PubdirFilter {
        self.pubdir_filter
    }

    /// How long to wait for a counter lock.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Timeout for each HTTP request.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(PublishConfigDeserialize, BTreeSet<String>), config::ConfigError> {
        let config = builder.build_cloned()?;

        let mut ignored = BTreeSet::new();
        let config: PublishConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })?;

        Ok((config, ignored))
    }
}

/// Overrides applied on top of the config files.
#[derive(Clone, Debug, Default)]
pub struct PublishOverrides {
    /// Overrides `publish-url`.
    pub publish_url: Option<String>,

    /// Overrides `pubdir`.
    pub pubdir: Option<Utf8PathBuf>,

    /// Overrides `pubdir-filter`.
    pub pubdir_filter: Option<PubdirFilter>,

    /// Overrides `lock-timeout`.
    pub lock_timeout: Option<Duration>,

    /// Overrides `http-timeout`.
    pub http_timeout: Option<Duration>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PublishConfigDeserialize {
    #[serde(default)]
    publish_url: Option<String>,
    #[serde(default)]
    pubdir: Option<Utf8PathBuf>,
    pubdir_filter: PubdirFilter,
    #[serde(with = "humantime_serde")]
    lock_timeout: Duration,
    #[serde(with = "humantime_serde")]
    http_timeout: Duration,
}

impl PublishConfigDeserialize {
    fn into_config(self) -> PublishConfig {
        PublishConfig {
            publish_url: self.publish_url,
            pubdir: self.pubdir,
            pubdir_filter: self.pubdir_filter,
            lock_timeout: self.lock_timeout,
            http_timeout: self.http_timeout,
        }
    }
}
