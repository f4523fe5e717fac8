//! Ez-proxy URL rewriting.
//!
//! A proxy template is a URL format string over the standard URL components,
//! e.g. `http://{netloc}.ez.statsbiblioteket.dk:2048{path}?{query}`, which
//! turns `http://www.nature.com/nature/journal/v440/n7082/full/nature04586.html`
//! into `http://www.nature.com.ez.statsbiblioteket.dk:2048/nature/journal/v440/n7082/full/nature04586.html?`.

use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("proxy template references unknown URL component: {{{0}}}")]
    UnknownComponent(String),

    #[error("proxy template does not expand to a valid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// The component names a template may reference, as in Python's `urlparse`.
const COMPONENTS: &[&str] = &["scheme", "netloc", "path", "params", "query", "fragment"];

/// Returns true if `url` already routes through the proxy described by
/// `template`.
///
/// Only the `scheme://netloc/path?query` part is considered: `;params` and
/// `#fragment` are split off both sides, every placeholder in the template
/// becomes a wildcard, and the url is proxied iff the resulting pattern
/// matches from the start.
pub fn is_proxied(url: &str, template: &str) -> Result<bool> {
    let url = strip_params_and_fragment(url);
    let template = strip_params_and_fragment(template);
    let pattern = expand(template, |name| {
        COMPONENTS.contains(&name).then(|| ".*".to_string())
    })?;
    let re = regex::Regex::new(&format!("^(?:{pattern})"))?;
    Ok(re.is_match(url))
}

/// Rewrites `url` into its proxied form using `template`.
///
/// An already-proxied url is returned unchanged. A url without a host part
/// is retried with an `http://` prefix. Referencing a component outside the
/// standard set fails with [`ProxyError::UnknownComponent`].
pub fn rewrite(url: &str, template: &str) -> Result<String> {
    if is_proxied(url, template)? {
        log::debug!("url is already proxied: {url}");
        return Ok(url.to_string());
    }
    let parsed = parse_lenient(url)?;
    let parts = UrlParts::of(&parsed);
    let rewritten = expand(template, |name| parts.component(name))?;
    log::debug!("rewrote {url} -> {rewritten}");
    Ok(rewritten)
}

fn strip_params_and_fragment(url: &str) -> &str {
    let url = url.split(';').next().unwrap_or(url);
    url.split('#').next().unwrap_or(url)
}

/// Parses a URL, falling back to an `http://` prefix when the input has no
/// host (`www.nature.com/article` style).
fn parse_lenient(url: &str) -> Result<Url> {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Ok(parsed),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(Url::parse(&format!("http://{url}"))?)
        }
        Err(e) => Err(e.into()),
    }
}

struct UrlParts {
    scheme: String,
    netloc: String,
    path: String,
    params: String,
    query: String,
    fragment: String,
}

impl UrlParts {
    fn of(url: &Url) -> Self {
        let mut netloc = url.host_str().unwrap_or_default().to_string();
        if let Some(port) = url.port() {
            netloc.push(':');
            netloc.push_str(&port.to_string());
        }
        // `;params` belongs to the last path segment only.
        let raw_path = url.path();
        let (path, params) = match raw_path.rfind('/') {
            Some(slash) => match raw_path[slash..].find(';') {
                Some(semi) => (
                    raw_path[..slash + semi].to_string(),
                    raw_path[slash + semi + 1..].to_string(),
                ),
                None => (raw_path.to_string(), String::new()),
            },
            None => (raw_path.to_string(), String::new()),
        };
        Self {
            scheme: url.scheme().to_string(),
            netloc,
            path,
            params,
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
        }
    }

    fn component(&self, name: &str) -> Option<String> {
        let value = match name {
            "scheme" => &self.scheme,
            "netloc" => &self.netloc,
            "path" => &self.path,
            "params" => &self.params,
            "query" => &self.query,
            "fragment" => &self.fragment,
            _ => return None,
        };
        Some(value.clone())
    }
}

/// Expands `{name}` placeholders via `value_of`; `{{` and `}}` are literal
/// braces. An unknown or unterminated placeholder is an error.
fn expand<F>(template: &str, mut value_of: F) -> Result<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(ProxyError::UnknownComponent(name)),
                    }
                }
                match value_of(&name) {
                    Some(value) => out.push_str(&value),
                    None => return Err(ProxyError::UnknownComponent(name)),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
