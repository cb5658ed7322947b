// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use celledit_engine::DateInputKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_ERROR_BANNER: &str = "3500ms";
const DEFAULT_SUCCESS_FLASH: &str = "600ms";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            storage: Storage::default(),
            ui: Ui::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub error_banner: Option<String>,
    pub success_flash: Option<String>,
    pub date_input: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            error_banner: Some(DEFAULT_ERROR_BANNER.to_owned()),
            success_flash: Some(DEFAULT_SUCCESS_FLASH.to_owned()),
            date_input: Some("calendar".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    pub filter: Option<String>,
    pub file: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            filter: Some(DEFAULT_LOG_FILTER.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CELLEDIT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set CELLEDIT_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(celledit_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [server], [storage], [ui], and [logging]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.server.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "server.base_url in {} must not be empty; remove it to use {DEFAULT_BASE_URL}",
                path.display()
            );
        }

        for (setting, value) in [
            ("server.timeout", &self.server.timeout),
            ("ui.error_banner", &self.ui.error_banner),
            ("ui.success_flash", &self.ui.success_flash),
        ] {
            if let Some(raw) = value {
                let parsed = parse_duration(raw)
                    .with_context(|| format!("{setting} in {}", path.display()))?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{setting} in {} must be positive, got {}",
                        path.display(),
                        raw
                    );
                }
            }
        }

        if let Some(kind) = &self.ui.date_input {
            parse_date_input(kind).with_context(|| format!("ui.date_input in {}", path.display()))?;
        }

        if let Some(db_path) = &self.storage.db_path {
            celledit_db::validate_db_path(db_path)?;
        }

        if let Some(filter) = &self.logging.filter {
            EnvFilter::try_new(filter).with_context(|| {
                format!(
                    "logging.filter {filter:?} in {} is not a valid filter; use e.g. \"info\" or \"celledit_engine=debug\"",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => celledit_db::default_db_path(),
        }
    }

    pub fn server_base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn server_timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn error_banner(&self) -> Result<Duration> {
        parse_duration(
            self.ui
                .error_banner
                .as_deref()
                .unwrap_or(DEFAULT_ERROR_BANNER),
        )
    }

    pub fn success_flash(&self) -> Result<Duration> {
        parse_duration(
            self.ui
                .success_flash
                .as_deref()
                .unwrap_or(DEFAULT_SUCCESS_FLASH),
        )
    }

    pub fn date_input(&self) -> Result<DateInputKind> {
        parse_date_input(self.ui.date_input.as_deref().unwrap_or("calendar"))
    }

    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.logging.file {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set logging.file to a writable log path")
        })?;
        Ok(data_root
            .join(celledit_db::APP_NAME)
            .join(format!("{}.log", celledit_db::APP_NAME)))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# celledit config\n# Place this file at: {}\n\nversion = 1\n\n[server]\n# Receives PATCH /inline/edit and POST /advance/query\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/celledit/celledit.db)\n# db_path = \"/absolute/path/to/celledit.db\"\n\n[ui]\nerror_banner = \"{}\"\nsuccess_flash = \"{}\"\n# calendar or plain\ndate_input = \"calendar\"\n\n[logging]\n# RUST_LOG overrides this when set\nfilter = \"{}\"\n# file = \"/absolute/path/to/celledit.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_ERROR_BANNER,
            DEFAULT_SUCCESS_FLASH,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn parse_date_input(raw: &str) -> Result<DateInputKind> {
    match raw.trim() {
        "calendar" => Ok(DateInputKind::Calendar),
        "plain" => Ok(DateInputKind::Plain),
        other => bail!("unknown date input {other:?}; use \"calendar\" or \"plain\""),
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
