// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Installs the global subscriber. `RUST_LOG` wins over `logging.filter`.
///
/// The terminal UI owns stdout and stderr while it runs, so interactive
/// sessions log to a file.
pub fn init(config: &Config, target: &LogTarget) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_filter())
            .with_context(|| format!("invalid logging.filter {:?}", config.log_filter()))?,
    };

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|error| anyhow!("install log subscriber: {error}"))?;
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| {
                    format!(
                        "open log file {}; set logging.file to a writable path",
                        path.display()
                    )
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|error| anyhow!("install log subscriber: {error}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{LogTarget, init};
    use crate::config::Config;
    use anyhow::Result;

    #[test]
    fn file_target_creates_its_directory_and_installs_once() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("celledit.log");
        let target = LogTarget::File(path.clone());

        init(&Config::default(), &target)?;
        assert!(path.exists());

        let error = init(&Config::default(), &target).expect_err("second install should fail");
        assert!(error.to_string().contains("install log subscriber"));
        Ok(())
    }
}
