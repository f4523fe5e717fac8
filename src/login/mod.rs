//! Institutional single-sign-on adaptors.
//!
//! Each adaptor is a fixed linear sequence of requests over the shared HTTP
//! client, where every step scrapes the previous response for the next URL
//! and form fields. Adaptors are looked up by their configured name.

pub mod au_lib;
pub mod huid;
pub mod scrape;

pub use au_lib::AuLibLogin;
pub use huid::HuidLogin;

use crate::client::Fetched;
use crate::prompt::Prompter;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoginError {
    /// A login page did not contain what the flow script expected. The page
    /// layout changed, or the session landed somewhere else entirely.
    #[error("login step '{step}' failed: {what} not found in page")]
    MissingElement {
        step: &'static str,
        what: &'static str,
    },

    #[error("HTTP request error during login: {0}")]
    Request(#[from] reqwest::Error),

    #[error("credential prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoginError>;

/// A scripted login sequence for one institution.
#[async_trait]
pub trait LoginAdaptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hosts whose appearance as a final redirect target means the session
    /// was bounced to this institution's login system.
    fn login_hosts(&self) -> &[&str];

    /// Drives the flow starting from the response that landed on the login
    /// host. On success the returned response is the originally requested,
    /// now-authenticated resource.
    async fn login(
        &self,
        http: &reqwest::Client,
        landing: &Fetched,
        credentials: &CredentialSource<'_>,
    ) -> Result<Fetched>;
}

/// Resolves a configured adaptor name. Names are matched case-insensitively.
pub fn adaptor_by_name(name: &str) -> Option<Box<dyn LoginAdaptor>> {
    match name.to_lowercase().as_str() {
        "au_lib" => Some(Box::new(AuLibLogin::new())),
        "huid" => Some(Box::new(HuidLogin::new())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where credentials come from: configured presets, falling back to an
/// interactive prompt unless prompting is disabled.
pub struct CredentialSource<'a> {
    pub prompter: &'a dyn Prompter,
    pub username: Option<String>,
    pub password: Option<String>,
    pub never_prompt: bool,
}

impl CredentialSource<'_> {
    /// Produces a usable credential pair. Interactive mode prompts with the
    /// presets (or the OS user) as defaults and re-prompts while either
    /// value ends up empty; `never_prompt` uses the presets verbatim.
    pub fn resolve(&self, realm: &str) -> Result<Credentials> {
        if self.never_prompt {
            log::info!("login prompt disabled, using configured credentials");
            return Ok(Credentials {
                username: self.username.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
            });
        }
        let mut username_default = self
            .username
            .clone()
            .unwrap_or_else(os_username);
        let mut password_default = self.password.clone().unwrap_or_default();
        let mut header = format!("{realm} login, username");
        loop {
            let username = self.prompter.line(&header, &username_default)?;
            let password = {
                let entered = self.prompter.password("password")?;
                if entered.is_empty() {
                    password_default.clone()
                } else {
                    entered
                }
            };
            if !username.is_empty() && !password.is_empty() {
                return Ok(Credentials { username, password });
            }
            header = "username or password is empty, please re-enter; username".to_string();
            username_default = username;
            password_default = password;
        }
    }
}

fn os_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
