//! Run configuration, merged from a YAML file and command-line overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy rewrite template over URL components,
    /// e.g. `http://{netloc}.ez.statsbiblioteket.dk:2048{path}`.
    pub proxy_url_fmt: Option<String>,

    /// Hosts for which the proxy is explicitly wanted.
    pub proxy_enabled_domains: Vec<String>,

    /// Hosts that must never be routed through the proxy.
    pub proxy_ignore_domains: Vec<String>,

    /// Name of the institutional login adaptor (`au_lib`, `huid`).
    pub login_adaptor: Option<String>,

    /// User-Agent override; a browser-like default is used otherwise.
    pub useragent: Option<String>,

    /// Extra headers applied to every request.
    pub headers: HashMap<String, String>,

    /// Cookies seeded into the jar at startup, scoped to
    /// `cookie_snatch_domain`.
    pub cookies: HashMap<String, String>,

    /// Where the cookie jar is persisted.
    pub cookies_filepath: Option<PathBuf>,

    /// Save the jar after a successful login or cookie snatch.
    pub cookies_persist_after_login: bool,

    /// Browser to snatch session cookies from (chrome, chromium, edge, brave).
    pub cookies_snatch_from: Option<String>,

    /// Cookie names worth snatching; empty means all cookies for the domain.
    pub cookie_snatch_keys: Vec<String>,

    /// Domain to extract browser cookies for.
    pub cookie_snatch_domain: Option<String>,

    pub login_username: Option<String>,
    pub login_password: Option<String>,

    /// Set to `never` to use the configured credentials without prompting.
    pub login_prompt: Option<String>,

    /// Pattern whose first capture group is a PDF href candidate.
    pub pdf_href_regex: Option<String>,

    pub pdf_download_dir: Option<PathBuf>,
    pub pdf_open_after_download: bool,
}

impl Config {
    /// Loads the config file, or the default location when `path` is `None`.
    /// A missing file is an empty config, not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };
        if !path.exists() {
            log::debug!(
                "config file not found: {}, starting from an empty config",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        config_base().join("config.yaml")
    }

    /// Cookie jar location, configured or the default next to the config.
    pub fn cookies_file(&self) -> PathBuf {
        match &self.cookies_filepath {
            Some(path) => expand_user(path),
            None => config_base().join("cookies.json"),
        }
    }

    /// Directory downloads land in: the configured one, else the user's
    /// download directory.
    pub fn download_dir(&self) -> PathBuf {
        match &self.pdf_download_dir {
            Some(dir) => expand_user(dir),
            None => dirs::download_dir().unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("Downloads")
            }),
        }
    }

    pub fn never_prompt(&self) -> bool {
        self.login_prompt.as_deref() == Some("never")
    }
}

fn config_base() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ezfetch")
}

/// `~/...` expansion for paths coming from YAML or the command line.
fn expand_user(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
