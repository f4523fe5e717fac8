//! Proxy-aware HTTP session.
//!
//! `EzClient` wraps a [`reqwest::Client`] with three behaviors: outgoing
//! URLs are rewritten through the configured ez-proxy template, a final
//! redirect onto a known institutional login host triggers the configured
//! login adaptor transparently, and the cookie jar is persisted to disk so
//! an authenticated session survives between runs.

pub mod types;

pub use types::Fetched;

use crate::config::Config;
use crate::login::{self, CredentialSource, LoginAdaptor, LoginError};
use crate::prompt::Prompter;
use crate::proxy::{self, ProxyError};
#[cfg(feature = "snatch")]
use crate::snatch::{self, BrowserKind, SnatchError};
use cookie_store::CookieStore;
use reqwest_cookie_store::CookieStoreMutex;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, MutexGuard, PoisonError};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("unknown login adaptor: {0}")]
    UnknownAdaptor(String),

    #[error("invalid header in config: {0}")]
    Header(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("cookie jar error: {0}")]
    CookieJar(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "snatch")]
    #[error(transparent)]
    Snatch(#[from] SnatchError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

/// Seeded and snatched cookies are written into the jar as persistent so
/// they survive `save_cookies`; a year matches typical proxy token life.
const SEEDED_COOKIE_TTL_SECS: i64 = 365 * 24 * 60 * 60;

pub struct EzClient {
    http: reqwest::Client,
    cookies: Arc<CookieStoreMutex>,
    adaptor: Option<Box<dyn LoginAdaptor>>,
    prompter: Box<dyn Prompter>,
    config: Config,
}

impl std::fmt::Debug for EzClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EzClient")
            .field("adaptor", &self.adaptor.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EzClient {
    pub fn new(config: Config, prompter: Box<dyn Prompter>) -> Result<Self> {
        let adaptor = match config.login_adaptor.as_deref() {
            Some(name) => Some(
                login::adaptor_by_name(name)
                    .ok_or_else(|| ClientError::UnknownAdaptor(name.to_string()))?,
            ),
            None => None,
        };

        let store = load_cookie_store(&config.cookies_file())?;
        let cookies = Arc::new(CookieStoreMutex::new(store));

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Header(format!("{name}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| ClientError::Header(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(
                config
                    .useragent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .default_headers(headers)
            .cookie_provider(cookies.clone())
            .build()?;

        let client = Self {
            http,
            cookies,
            adaptor,
            prompter,
            config,
        };
        client.seed_config_cookies()?;
        Ok(client)
    }

    /// Whether `url` should be routed through the proxy: explicit enable
    /// and ignore lists first, then "proxy whenever a template exists".
    pub fn use_proxy(&self, url: &str) -> bool {
        let has_template = self.config.proxy_url_fmt.is_some();
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
        else {
            return has_template;
        };
        if self.config.proxy_enabled_domains.iter().any(|d| d == &host) {
            return has_template;
        }
        if self.config.proxy_ignore_domains.iter().any(|d| d == &host) {
            return false;
        }
        has_template
    }

    /// Applies the proxy rewrite when wanted and not already applied.
    pub fn ensure_proxy(&self, url: &str) -> Result<String> {
        let Some(template) = self.config.proxy_url_fmt.as_deref() else {
            return Ok(url.to_string());
        };
        if !self.use_proxy(url) {
            return Ok(url.to_string());
        }
        Ok(proxy::rewrite(url, template)?)
    }

    /// GET through the proxy. When the final response host turns out to be
    /// the institution's login system, the configured adaptor takes over
    /// and its final response replaces this one.
    pub async fn get(&self, url: &str) -> Result<Fetched> {
        let target = self.ensure_proxy(url)?;
        let response = self.http.get(&target).send().await?;
        let mut fetched = Fetched::read(response).await?;

        if let Some(adaptor) = &self.adaptor {
            let on_login_host = fetched
                .host_str()
                .is_some_and(|host| adaptor.login_hosts().contains(&host));
            if on_login_host {
                log::info!(
                    "redirected to {} login page, attempting login",
                    adaptor.name()
                );
                let credentials = CredentialSource {
                    prompter: self.prompter.as_ref(),
                    username: self.config.login_username.clone(),
                    password: self.config.login_password.clone(),
                    never_prompt: self.config.never_prompt(),
                };
                fetched = adaptor.login(&self.http, &fetched, &credentials).await?;
                if self.config.cookies_persist_after_login {
                    self.save_cookies()?;
                }
            }
        }
        Ok(fetched)
    }

    /// Merges cookies for `domain` from a local browser into the jar.
    /// Returns how many were merged.
    #[cfg(feature = "snatch")]
    pub fn snatch_cookies(
        &self,
        browser: BrowserKind,
        keys: &[String],
        domain: &str,
    ) -> Result<usize> {
        let snatched = snatch::snatch_cookies(browser, domain, keys)?;
        let count = snatched.len();
        for cookie in snatched {
            self.insert_cookie(&cookie.name, &cookie.value, &cookie.host, cookie.expires_unix())?;
        }
        log::info!("merged {count} browser cookies for {domain}");
        if self.config.cookies_persist_after_login {
            self.save_cookies()?;
        }
        Ok(count)
    }

    /// Writes the jar to the configured cookie file.
    pub fn save_cookies(&self) -> Result<()> {
        let path = self.config.cookies_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(std::fs::File::create(&path)?);
        cookie_store::serde::json::save(&self.jar(), &mut writer)
            .map_err(|e| ClientError::CookieJar(e.to_string()))?;
        log::debug!("saved cookie jar to {}", path.display());
        Ok(())
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cookies supplied directly in the config, scoped to the snatch domain.
    fn seed_config_cookies(&self) -> Result<()> {
        if self.config.cookies.is_empty() {
            return Ok(());
        }
        let Some(domain) = self.config.cookie_snatch_domain.as_deref() else {
            log::warn!("config cookies given without cookie_snatch_domain, ignoring them");
            return Ok(());
        };
        for (name, value) in &self.config.cookies {
            self.insert_cookie(name, value, domain, None)?;
        }
        log::debug!(
            "seeded {} config cookies for {domain}",
            self.config.cookies.len()
        );
        Ok(())
    }

    fn insert_cookie(
        &self,
        name: &str,
        value: &str,
        host: &str,
        expires_unix: Option<i64>,
    ) -> Result<()> {
        use std::time::{SystemTime, UNIX_EPOCH};

        let host = host.trim_start_matches('.');
        let url = Url::parse(&format!("https://{host}/"))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let max_age = expires_unix
            .map(|expiry| (expiry - now).max(0))
            .unwrap_or(SEEDED_COOKIE_TTL_SECS);
        let raw = cookie_store::RawCookie::parse(format!("{name}={value}; Max-Age={max_age}"))
            .map_err(|e| ClientError::CookieJar(e.to_string()))?;
        self.jar()
            .insert_raw(&raw, &url)
            .map_err(|e| ClientError::CookieJar(e.to_string()))?;
        Ok(())
    }

    fn jar(&self) -> MutexGuard<'_, CookieStore> {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loads the persisted jar; a missing file is a fresh session.
fn load_cookie_store(path: &Path) -> Result<CookieStore> {
    match std::fs::File::open(path) {
        Ok(file) => cookie_store::serde::json::load(BufReader::new(file))
            .map_err(|e| ClientError::CookieJar(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!(
                "no cookie file at {}, starting a fresh session",
                path.display()
            );
            Ok(CookieStore::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Prompter;
    use std::io;
    use std::path::PathBuf;

    struct NoPrompts;

    impl Prompter for NoPrompts {
        fn line(&self, _prompt: &str, _default: &str) -> io::Result<String> {
            Err(io::Error::other("no prompting in tests"))
        }

        fn password(&self, _prompt: &str) -> io::Result<String> {
            Err(io::Error::other("no prompting in tests"))
        }

        fn select(&self, _header: &str, _items: &[String]) -> io::Result<usize> {
            Err(io::Error::other("no prompting in tests"))
        }
    }

    fn config_with_jar(dir: &Path) -> Config {
        Config {
            cookies_filepath: Some(dir.join("cookies.json")),
            ..Config::default()
        }
    }

    fn client(config: Config) -> EzClient {
        EzClient::new(config, Box::new(NoPrompts)).unwrap()
    }

    #[test]
    fn proxy_domain_lists_drive_use_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_jar(dir.path());
        config.proxy_url_fmt = Some("http://{netloc}.ez.example.edu:2048{path}".to_string());
        config.proxy_enabled_domains = vec!["www.nature.com".to_string()];
        config.proxy_ignore_domains = vec!["arxiv.org".to_string()];
        let client = client(config);

        assert!(client.use_proxy("http://www.nature.com/article"));
        assert!(!client.use_proxy("https://arxiv.org/abs/1706.03762"));
        // Neither listed: template presence decides.
        assert!(client.use_proxy("https://journals.aps.org/prl"));
    }

    #[test]
    fn no_template_means_no_proxying() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(config_with_jar(dir.path()));
        assert!(!client.use_proxy("http://www.nature.com/article"));
        assert_eq!(
            client.ensure_proxy("http://www.nature.com/article").unwrap(),
            "http://www.nature.com/article"
        );
    }

    #[test]
    fn ensure_proxy_rewrites_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_jar(dir.path());
        config.proxy_url_fmt = Some("http://{netloc}.ez.example.edu:2048{path}".to_string());
        let client = client(config);

        let first = client.ensure_proxy("http://www.nature.com/article").unwrap();
        assert_eq!(
            first,
            "http://www.nature.com.ez.example.edu:2048/article"
        );
        assert_eq!(client.ensure_proxy(&first).unwrap(), first);
    }

    #[test]
    fn unknown_adaptor_is_rejected_at_build_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_jar(dir.path());
        config.login_adaptor = Some("mit".to_string());
        let err = EzClient::new(config, Box::new(NoPrompts)).unwrap_err();
        assert!(matches!(err, ClientError::UnknownAdaptor(name) if name == "mit"));
    }

    #[tokio::test]
    async fn seeded_config_cookies_ride_along_on_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/check")
            .match_header("cookie", mockito::Matcher::Regex("sbez=tok123".to_string()))
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_jar(dir.path());
        config.cookie_snatch_domain = Some("127.0.0.1".to_string());
        config
            .cookies
            .insert("sbez".to_string(), "tok123".to_string());
        let client = client(config);

        let fetched = client
            .get(&format!("{}/check", server.url()))
            .await
            .unwrap();
        assert_eq!(fetched.body, b"%PDF-1.4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cookie_jar_round_trips_through_the_configured_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/check")
            .match_header("cookie", mockito::Matcher::Regex("sbez=tok123".to_string()))
            .with_body("ok")
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_jar(dir.path());
        config.cookie_snatch_domain = Some("127.0.0.1".to_string());
        config
            .cookies
            .insert("sbez".to_string(), "tok123".to_string());

        let first = client(config.clone());
        first.get(&format!("{}/check", server.url())).await.unwrap();
        first.save_cookies().unwrap();
        drop(first);

        // Second client loads the jar from disk, without seeding.
        config.cookies.clear();
        let second = client(config);
        second.get(&format!("{}/check", server.url())).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn corrupt_jar_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path: PathBuf = dir.path().join("cookies.json");
        std::fs::write(&jar_path, "not json at all {").unwrap();
        let config = Config {
            cookies_filepath: Some(jar_path),
            ..Config::default()
        };
        assert!(matches!(
            EzClient::new(config, Box::new(NoPrompts)),
            Err(ClientError::CookieJar(_))
        ));
    }
}
