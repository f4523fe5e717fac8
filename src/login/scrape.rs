//! Regex scraping of login pages. The SSO pages involved are
//! machine-generated and stable enough that a handful of patterns beats a
//! full HTML parser; any miss surfaces as a step failure upstream.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"(?s)<form.*?</form>"));

static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    static_regex(r#"(?s)<input[^<>]*?name="(?P<name>[^"]*)"[^<>]*?value="(?P<value>[^"]*)"[^<>]*?/?>"#)
});

static SAML_RESPONSE_RE: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r#"name="SAMLResponse" value="([A-Za-z0-9+/=]*)""#));

static RELAY_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r#"name="RelayState" value="([^\s"]*)""#));

fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("built-in pattern failed to compile: {e}"))
}

/// Query parameters of `url` as owned pairs, ready to re-post.
pub fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// `url` with query and fragment dropped; login forms post back to their
/// own page with the parameters carried in the body.
pub fn action_url(url: &Url) -> String {
    let mut action = url.clone();
    action.set_query(None);
    action.set_fragment(None);
    action.to_string()
}

/// All `name`/`value` pairs of `<input>` elements in the first form of
/// `html`. Hidden CAS fields like `lt` and `execution` arrive this way.
pub fn form_input_fields(html: &str) -> Option<HashMap<String, String>> {
    let form = FORM_RE.find(html)?.as_str();
    Some(
        INPUT_RE
            .captures_iter(form)
            .map(|caps| (caps["name"].to_string(), caps["value"].to_string()))
            .collect(),
    )
}

/// The base64 `SAMLResponse` hidden-input value, if present.
pub fn saml_response(html: &str) -> Option<String> {
    SAML_RESPONSE_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// The `RelayState` hidden-input value, if present.
pub fn relay_state(html: &str) -> Option<String> {
    RELAY_STATE_RE.captures(html).map(|caps| caps[1].to_string())
}
