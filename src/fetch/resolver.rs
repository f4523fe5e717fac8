//! Walk from an HTML landing page to the PDF it links.

use super::{FetchError, Result};
use crate::client::{EzClient, Fetched};
use crate::prompt::Prompter;
use regex::Regex;
use std::collections::BTreeSet;
use url::Url;

/// Default candidate pattern: any anchor href ending in `.pdf`.
pub const DEFAULT_PDF_HREF_REGEX: &str = r#"<a .*?href="([^\s]+\.pdf)""#;

/// How many HTML hops to follow before giving up.
pub const DEFAULT_MAX_DEPTH: usize = 4;

pub struct ResolveOptions<'a> {
    pub link_pattern: &'a str,
    pub max_depth: usize,
    pub prompter: &'a dyn Prompter,
}

/// PDF href candidates scraped out of `html`: first capture group of
/// `pattern`, deduplicated and deterministically sorted.
pub fn pdf_candidates(html: &str, pattern: &str) -> std::result::Result<Vec<String>, regex::Error> {
    let re = Regex::new(pattern)?;
    let unique: BTreeSet<String> = re
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    Ok(unique.into_iter().collect())
}

/// Standard base+relative join for a scraped href.
pub fn resolve_pdf_href(base: &Url, href: &str) -> std::result::Result<Url, url::ParseError> {
    base.join(href)
}

/// Fetches `url`, following scraped PDF links through HTML pages until a
/// non-HTML response appears. `None` means "no PDF found here": either a
/// page with no candidate link, or the depth bound ran out. Neither is an
/// error; the caller decides what absence means.
pub async fn resolve_pdf(
    client: &EzClient,
    url: &str,
    options: &ResolveOptions<'_>,
) -> Result<Option<Fetched>> {
    let mut target = url.to_string();
    for _ in 0..options.max_depth {
        let fetched = client.get(&target).await?;
        if !fetched.is_html() {
            return Ok(Some(fetched));
        }

        log::info!("response from {} is html, scraping for a pdf link", fetched.url);
        let mut candidates = pdf_candidates(&fetched.text(), options.link_pattern)?;
        let href = match candidates.len() {
            0 => {
                log::info!("no pdf href found in {}", fetched.url);
                return Ok(None);
            }
            1 => candidates.remove(0),
            _ => {
                let index = options.prompter.select(
                    "Multiple PDF href candidates found. Please select one:",
                    &candidates,
                )?;
                candidates
                    .get(index)
                    .cloned()
                    .ok_or(FetchError::Selection(index))?
            }
        };
        let next = resolve_pdf_href(&fetched.url, &href)?;
        log::debug!("following pdf candidate {next}");
        target = next.into();
    }
    log::info!("pdf link recursion limit reached, giving up");
    Ok(None)
}
