//! Snatch session cookies from a locally installed browser.
//!
//! Reads the Chromium-family cookie database directly, so an ez-proxy
//! session established in the browser (e.g. the `ezproxyezpprod1` or `sbez`
//! token) can be reused without logging in again.

pub mod chromium;
pub mod crypto;

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnatchError {
    #[error("unknown browser: {0} (expected chrome, chromium, edge or brave)")]
    UnknownBrowser(String),

    #[error("no cookie database found for {0}")]
    NoCookieDatabase(&'static str),

    #[error("cookie database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decrypt cookie value: {0}")]
    Decrypt(String),
}

pub type Result<T> = std::result::Result<T, SnatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Edge,
    Brave,
}

impl BrowserKind {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "Chrome",
            BrowserKind::Chromium => "Chromium",
            BrowserKind::Edge => "Edge",
            BrowserKind::Brave => "Brave",
        }
    }

    /// The browser's user-data directory on this platform, if the
    /// convention for it is known.
    fn user_data_dir(&self) -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config = dirs::config_dir()?;
            let dir = match self {
                BrowserKind::Chrome => config.join("google-chrome"),
                BrowserKind::Chromium => config.join("chromium"),
                BrowserKind::Edge => config.join("microsoft-edge"),
                BrowserKind::Brave => config.join("BraveSoftware/Brave-Browser"),
            };
            Some(dir)
        }

        #[cfg(target_os = "macos")]
        {
            let support = dirs::home_dir()?.join("Library/Application Support");
            let dir = match self {
                BrowserKind::Chrome => support.join("Google/Chrome"),
                BrowserKind::Chromium => support.join("Chromium"),
                BrowserKind::Edge => support.join("Microsoft Edge"),
                BrowserKind::Brave => support.join("BraveSoftware/Brave-Browser"),
            };
            Some(dir)
        }

        #[cfg(target_os = "windows")]
        {
            let local = PathBuf::from(std::env::var_os("LOCALAPPDATA")?);
            let dir = match self {
                BrowserKind::Chrome => local.join("Google\\Chrome\\User Data"),
                BrowserKind::Chromium => local.join("Chromium\\User Data"),
                BrowserKind::Edge => local.join("Microsoft\\Edge\\User Data"),
                BrowserKind::Brave => local.join("BraveSoftware\\Brave-Browser\\User Data"),
            };
            Some(dir)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        None
    }
}

impl FromStr for BrowserKind {
    type Err = SnatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chrome" | "google-chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "edge" | "microsoft-edge" => Ok(BrowserKind::Edge),
            "brave" => Ok(BrowserKind::Brave),
            other => Err(SnatchError::UnknownBrowser(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnatchedCookie {
    pub name: String,
    pub value: String,
    pub host: String,
    pub path: String,
    /// Microseconds since the Windows epoch, as stored by Chromium.
    pub expires_utc: i64,
}

impl SnatchedCookie {
    /// Expiry as a unix timestamp; `None` for session cookies.
    pub fn expires_unix(&self) -> Option<i64> {
        let unix = (self.expires_utc / 1_000_000) - 11_644_473_600;
        (unix > 0).then_some(unix)
    }

    pub fn is_expired(&self) -> bool {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.expires_unix().is_some_and(|expiry| expiry < now)
    }
}

/// Reads cookies for `domain` from the browser's first usable profile,
/// keeping only the names in `keys` (all of them, when `keys` is empty).
pub fn snatch_cookies(
    browser: BrowserKind,
    domain: &str,
    keys: &[String],
) -> Result<Vec<SnatchedCookie>> {
    let db_path = cookie_db_path(browser)?;
    log::debug!("reading {} cookies from {}", browser.name(), db_path.display());
    chromium::read_cookies(&db_path, domain, keys)
}

/// `Default` profile first, then `Profile N` directories in order.
fn cookie_db_path(browser: BrowserKind) -> Result<PathBuf> {
    let base = browser
        .user_data_dir()
        .ok_or(SnatchError::NoCookieDatabase(browser.name()))?;
    let default = base.join("Default").join("Cookies");
    if default.exists() {
        return Ok(default);
    }
    let mut profiles: Vec<PathBuf> = std::fs::read_dir(&base)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_dir()
                        && path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with("Profile "))
                })
                .collect()
        })
        .unwrap_or_default();
    profiles.sort();
    profiles
        .into_iter()
        .map(|profile| profile.join("Cookies"))
        .find(|candidate| candidate.exists())
        .ok_or(SnatchError::NoCookieDatabase(browser.name()))
}
