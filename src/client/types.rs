use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::borrow::Cow;
use url::Url;

/// Immutable snapshot of an HTTP response: the final post-redirect URL,
/// status, content type and body bytes. Everything downstream (login-host
/// detection, html-vs-pdf decision, link scraping) works off this.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Drains a [`reqwest::Response`] into a snapshot.
    pub async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let url = response.url().clone();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            url,
            status,
            content_type,
            body,
        })
    }

    /// Lossy text view of the body, for scraping.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// True when the Content-Type mentions html. Anything else is assumed
    /// to be the PDF itself.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("html"))
    }

    pub fn host_str(&self) -> Option<&str> {
        self.url.host_str()
    }
}
