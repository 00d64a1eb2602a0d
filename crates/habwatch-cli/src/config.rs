// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use habwatch_app::Settings;
use habwatch_client::Credentials;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "habwatch";
const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "HABWATCH_CONFIG_PATH";
const DEFAULT_ROOT_URL: &str = "http://localhost:8080";
const DEFAULT_SITEMAP: &str = "default";
const DEFAULT_TIMEOUT: &str = "10s";
const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub root_url: Option<String>,
    pub sitemap: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            root_url: Some(DEFAULT_ROOT_URL.to_owned()),
            sitemap: Some(DEFAULT_SITEMAP.to_owned()),
            username: None,
            password: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
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
                    "config file {} has no version. Add `version = 1` and put values under [server], [ui], and [log]",
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
        Settings::new(self.root_url()).with_context(|| {
            format!("invalid server.root_url in {}", path.display())
        })?;

        if self.sitemap().is_empty() {
            bail!("server.sitemap in {} must not be empty", path.display());
        }

        if self.server.password.is_some() && self.username().is_none() {
            bail!(
                "server.password in {} is set without server.username",
                path.display()
            );
        }

        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
            if parsed > MAX_TIMEOUT {
                bail!(
                    "server.timeout in {} must be at most {}m, got {}",
                    path.display(),
                    MAX_TIMEOUT.as_secs() / 60,
                    timeout
                );
            }
        }

        let level = self.log_level();
        if !LOG_LEVELS.contains(&level) {
            bail!(
                "log.level in {} must be one of {}, got {:?}",
                path.display(),
                LOG_LEVELS.join(", "),
                level
            );
        }

        Ok(())
    }

    pub fn root_url(&self) -> &str {
        self.server
            .root_url
            .as_deref()
            .unwrap_or(DEFAULT_ROOT_URL)
            .trim()
    }

    pub fn settings(&self) -> Result<Settings> {
        Settings::new(self.root_url())
    }

    pub fn sitemap(&self) -> &str {
        self.server
            .sitemap
            .as_deref()
            .unwrap_or(DEFAULT_SITEMAP)
            .trim()
    }

    fn username(&self) -> Option<&str> {
        self.server
            .username
            .as_deref()
            .map(str::trim)
            .filter(|username| !username.is_empty())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.username().map(|username| Credentials {
            username: username.to_owned(),
            password: self.server.password.clone().unwrap_or_default(),
        })
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn title(&self) -> Option<&str> {
        self.ui
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL).trim()
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log.file {
            Some(file) => Ok(PathBuf::from(file)),
            None => Ok(data_dir()?.join("habwatch.log")),
        }
    }

    pub fn trust_file_path(&self) -> Result<PathBuf> {
        Ok(data_dir()?.join("trusted-hosts.json"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# habwatch config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nroot_url = \"{}\"\nsitemap = \"{}\"\n# username = \"openhab\"\n# password = \"secret\"\ntimeout = \"{}\"\n\n[ui]\n# Shown until the first page loads\n# title = \"Home\"\n\n[log]\n# One of: off, error, warn, info, debug, trace. RUST_LOG overrides it.\nlevel = \"{}\"\n# Default is the platform data dir (for example ~/.local/share/habwatch/habwatch.log)\n# file = \"/absolute/path/to/habwatch.log\"\n",
            path.display(),
            DEFAULT_ROOT_URL,
            DEFAULT_SITEMAP,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn data_dir() -> Result<PathBuf> {
    let root = dirs::data_dir()
        .ok_or_else(|| anyhow!("cannot resolve data directory; set [log].file explicitly"))?;
    Ok(root.join(APP_NAME))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("timeout duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_PATH_ENV, Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.root_url(), "http://localhost:8080");
        assert_eq!(config.sitemap(), "default");
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert!(config.credentials().is_none());
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nsitemap=\"home\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nroot_url = \"https://openhab.local:8443/\"\nsitemap = \"home\"\nusername = \"watch\"\npassword = \"secret\"\ntimeout = \"2s\"\n[ui]\ntitle = \"Cottage\"\n[log]\nlevel = \"debug\"\nfile = \"/tmp/habwatch-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.settings()?.host(), "openhab.local");
        assert_eq!(config.sitemap(), "home");
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        let credentials = config.credentials().expect("credentials configured");
        assert_eq!(credentials.username, "watch");
        assert_eq!(credentials.password, "secret");
        assert_eq!(config.title(), Some("Cottage"));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/habwatch-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn root_url_must_be_http() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\nroot_url = \"ftp://nas.local\"\n")?;
        let error = Config::load(&path).expect_err("ftp root should fail");
        assert!(format!("{error:#}").contains("server.root_url"));
        Ok(())
    }

    #[test]
    fn empty_sitemap_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\nsitemap = \"  \"\n")?;
        let error = Config::load(&path).expect_err("empty sitemap should fail");
        assert!(error.to_string().contains("must not be empty"));
        Ok(())
    }

    #[test]
    fn password_without_username_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\npassword = \"secret\"\n")?;
        let error = Config::load(&path).expect_err("orphan password should fail");
        assert!(error.to_string().contains("without server.username"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("bad level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("habwatch/config.toml"));
        Ok(())
    }

    #[test]
    fn default_log_and_trust_paths_live_under_data_dir() -> Result<()> {
        let config = Config::default();
        assert!(config.log_path()?.ends_with("habwatch/habwatch.log"));
        assert!(config.trust_file_path()?.ends_with("habwatch/trusted-hosts.json"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        let message = error.to_string();
        assert!(
            message.contains("invalid duration") || message.contains("invalid timeout duration"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn oversized_minute_timeout_is_rejected() -> Result<()> {
        let error = parse_duration("307445734561825861m").expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"), "got {error}");

        let (_temp, path) =
            write_config("version = 1\n[server]\ntimeout = \"307445734561825861m\"\n")?;
        let error = Config::load(&path).expect_err("overflowing timeout should fail");
        assert!(format!("{error:#}").contains("too large"), "got {error:#}");

        let (_temp, path) = write_config("version = 1\n[server]\ntimeout = \"90m\"\n")?;
        let error = Config::load(&path).expect_err("hour-long timeout should fail");
        assert!(error.to_string().contains("at most 60m"), "got {error}");
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected_in_config() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_is_loadable() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[server]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.sitemap(), "default");
        Ok(())
    }
}
