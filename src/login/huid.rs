//! Harvard HUID login.
//!
//! CAS form: every hidden input of the login form (one-time `lt` token,
//! `execution` state and the rest) is collected generically and posted back
//! to the form page with the PIN authentication source selected. The
//! provider finishes the flow through ordinary redirects, so the post
//! response is already the requested resource.

use super::scrape;
use super::{CredentialSource, LoginAdaptor, LoginError, Result};
use crate::client::Fetched;
use async_trait::async_trait;

const LOGIN_HOSTS: &[&str] = &["www.pin1.harvard.edu"];

const AUTH_SOURCE_FIELD: &str = "compositeAuthenticationSourceType";
const AUTH_SOURCE_PIN: &str = "PIN";

pub struct HuidLogin;

impl HuidLogin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HuidLogin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoginAdaptor for HuidLogin {
    fn name(&self) -> &'static str {
        "huid"
    }

    fn login_hosts(&self) -> &[&str] {
        LOGIN_HOSTS
    }

    async fn login(
        &self,
        http: &reqwest::Client,
        landing: &Fetched,
        credentials: &CredentialSource<'_>,
    ) -> Result<Fetched> {
        let html = landing.text();
        let mut fields =
            scrape::form_input_fields(&html).ok_or(LoginError::MissingElement {
                step: "parse-login-form",
                what: "login <form> with input fields",
            })?;
        let query = scrape::query_pairs(&landing.url);
        if query.is_empty() {
            return Err(LoginError::MissingElement {
                step: "parse-login-form",
                what: "service query parameters",
            });
        }

        fields.insert(AUTH_SOURCE_FIELD.to_string(), AUTH_SOURCE_PIN.to_string());
        let creds = credentials.resolve("HUID")?;
        fields.insert("username".to_string(), creds.username);
        fields.insert("password".to_string(), creds.password);

        let authenticated = Fetched::read(
            http.post(scrape::action_url(&landing.url))
                .query(&query)
                .form(&fields)
                .send()
                .await?,
        )
        .await?;
        log::info!("login complete, landed on {}", authenticated.url);
        Ok(authenticated)
    }
}
