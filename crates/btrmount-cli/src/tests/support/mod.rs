//! Shared helpers for the CLI test suites.

mod fake_daemon;

use std::ffi::OsString;

use btrmount_config::Config;

pub(crate) use fake_daemon::{FakeBehaviour, FakeDaemon};

use crate::AppError;
use crate::config::ConfigLoader;

/// Loader that ignores the command line and returns a fixed configuration.
pub(crate) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(crate) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Splits a command written as it would be typed into arguments.
pub(crate) fn command_line(command: &str) -> Vec<OsString> {
    std::iter::once("btrmount")
        .chain(command.split_whitespace())
        .map(OsString::from)
        .collect()
}
