//! Fetch orchestration: build a session, resolve the PDF, land it on disk.

pub mod resolver;

pub use resolver::{
    DEFAULT_MAX_DEPTH, DEFAULT_PDF_HREF_REGEX, ResolveOptions, pdf_candidates, resolve_pdf,
    resolve_pdf_href,
};

use crate::client::{ClientError, EzClient, Fetched};
use crate::config::Config;
use crate::prompt::TerminalPrompter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("invalid pdf href pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("could not resolve pdf href: {0}")]
    Href(#[from] url::ParseError),

    #[error("selection index {0} out of range")]
    Selection(usize),

    #[error("{path} already exists, and so do {attempts} similarly-named files")]
    SaveExhausted { path: PathBuf, attempts: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

const UNIQUE_NAME_ATTEMPTS: usize = 1000;

/// Fetches the PDF behind `url` and saves it under the configured download
/// directory. Returns the saved path, or `None` when no PDF was resolved.
pub async fn fetch_pdf(url: &str, config: &Config) -> Result<Option<PathBuf>> {
    let client = EzClient::new(config.clone(), Box::new(TerminalPrompter))?;

    #[cfg(feature = "snatch")]
    if let Some(browser) = config.cookies_snatch_from.as_deref() {
        let kind = browser.parse().map_err(ClientError::Snatch)?;
        match config.cookie_snatch_domain.as_deref() {
            Some(domain) => {
                client.snatch_cookies(kind, &config.cookie_snatch_keys, domain)?;
            }
            None => log::warn!("cookies_snatch_from set without cookie_snatch_domain, skipping"),
        }
    }

    fetch_pdf_with(url, config, &client).await
}

/// Same flow with a caller-built session.
pub async fn fetch_pdf_with(
    url: &str,
    config: &Config,
    client: &EzClient,
) -> Result<Option<PathBuf>> {
    let pattern = config
        .pdf_href_regex
        .clone()
        .unwrap_or_else(|| DEFAULT_PDF_HREF_REGEX.to_string());
    let options = ResolveOptions {
        link_pattern: &pattern,
        max_depth: DEFAULT_MAX_DEPTH,
        prompter: client.prompter(),
    };

    let Some(found) = resolver::resolve_pdf(client, url, &options).await? else {
        log::info!("no pdf resolved from {url}");
        return Ok(None);
    };
    log::info!("obtained {} bytes from {}", found.body.len(), found.url);

    let path = save_file(&found, &config.download_dir())?;
    if config.pdf_open_after_download {
        log::debug!("opening {}", path.display());
        open::that(&path)?;
    }
    Ok(Some(path))
}

/// Saves the response body into `dir` under the basename of the response
/// URL, never clobbering an existing file.
pub fn save_file(fetched: &Fetched, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = unique_path(&dir.join(filename_from_url(&fetched.url)))?;
    log::info!("saving {} to {}", fetched.url, path.display());
    std::fs::write(&path, &fetched.body)?;
    Ok(path)
}

fn filename_from_url(url: &Url) -> String {
    let name = url.path().rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        "download.pdf".to_string()
    } else {
        name.to_string()
    }
}

/// First free path derived from `path` by suffixing `" (n)"` before the
/// extension.
pub fn unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    for n in 1..UNIQUE_NAME_ATTEMPTS {
        let candidate = path.with_file_name(format!("{stem} ({n}){ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(FetchError::SaveExhausted {
        path: path.to_path_buf(),
        attempts: UNIQUE_NAME_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::resolver::tests::plain_client;
    use super::*;

    #[test]
    fn unique_path_counts_upward() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.pdf");

        assert_eq!(unique_path(&report).unwrap(), report);

        std::fs::write(&report, b"first").unwrap();
        assert_eq!(
            unique_path(&report).unwrap(),
            dir.path().join("report (1).pdf")
        );

        std::fs::write(dir.path().join("report (1).pdf"), b"second").unwrap();
        assert_eq!(
            unique_path(&report).unwrap(),
            dir.path().join("report (2).pdf")
        );
    }

    #[test]
    fn filename_falls_back_when_path_ends_in_slash() {
        let url = Url::parse("http://x.com/files/").unwrap();
        assert_eq!(filename_from_url(&url), "download.pdf");
        let url = Url::parse("http://x.com/files/paper.pdf").unwrap();
        assert_eq!(filename_from_url(&url), "paper.pdf");
    }

    #[tokio::test]
    async fn orchestrator_saves_under_the_configured_directory() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/article.html")
            .with_header("content-type", "text/html")
            .with_body(r#"<html><a href="/files/paper.pdf">pdf</a></html>"#)
            .create_async()
            .await;
        server
            .mock("GET", "/files/paper.pdf")
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4 body")
            .create_async()
            .await;

        let jar_dir = tempfile::tempdir().unwrap();
        let download_dir = tempfile::tempdir().unwrap();
        let client = plain_client(jar_dir.path());
        let config = Config {
            pdf_download_dir: Some(download_dir.path().to_path_buf()),
            ..Config::default()
        };

        let saved = fetch_pdf_with(
            &format!("{}/article.html", server.url()),
            &config,
            &client,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(saved, download_dir.path().join("paper.pdf"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn unresolved_pdf_produces_no_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/article.html")
            .with_header("content-type", "text/html")
            .with_body("<html>paywall, no links</html>")
            .create_async()
            .await;

        let jar_dir = tempfile::tempdir().unwrap();
        let download_dir = tempfile::tempdir().unwrap();
        let client = plain_client(jar_dir.path());
        let config = Config {
            pdf_download_dir: Some(download_dir.path().to_path_buf()),
            ..Config::default()
        };

        let saved = fetch_pdf_with(
            &format!("{}/article.html", server.url()),
            &config,
            &client,
        )
        .await
        .unwrap();
        assert!(saved.is_none());
        assert_eq!(std::fs::read_dir(download_dir.path()).unwrap().count(), 0);
    }
}
