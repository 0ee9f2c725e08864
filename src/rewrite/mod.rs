//! URL rewriting: relative `url()` references in CSS and CDN substitution.
//!
//! Every outbound asset URL routes through [`apply_cdn`] so CDN host
//! substitution is applied uniformly across stylesheets, scripts, and
//! markup image references.

pub mod content;

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use url::Url;

use crate::config::CdnConfig;
use crate::log;

/// URL class for CDN substitution scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlCategory {
    Css,
    Js,
    Image,
}

/// `url(...)` reference inside minified CSS, quoted or bare.
///
/// The regex crate has no backreferences, so the three quoting forms are
/// separate alternatives.
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^"')][^)\s]*))\s*\)"#).expect("static regex")
});

/// URL scheme prefix (`https:`, `data:`, ...).
static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("static regex"));

/// Substitute the CDN host for the site origin in an asset URL.
///
/// No-op unless CDN is enabled, the category is enabled, and the URL carries
/// the exact site origin as a prefix. The substitution is a single literal
/// prefix replacement, deliberately not a URL parse/rebuild.
pub fn apply_cdn<'a>(url: &'a str, category: UrlCategory, cdn: &CdnConfig) -> Cow<'a, str> {
    if !cdn.enabled || !cdn.applies_to(category) || cdn.origin.is_empty() || cdn.host.is_empty() {
        return Cow::Borrowed(url);
    }
    if let Some(rest) = url.strip_prefix(cdn.origin.as_str())
        && (rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    {
        return Cow::Owned(format!("{}{}", cdn.host, rest));
    }
    Cow::Borrowed(url)
}

/// Rewrite relative `url()` references in minified CSS to absolute URLs.
///
/// References are resolved against `source_public_url` (the absolute public
/// URL of the original stylesheet), then CDN-substituted for the CSS
/// category. Scheme-qualified, protocol-relative, root-absolute, and
/// fragment references pass through byte-for-byte unchanged.
pub fn rewrite_css_urls(css: &str, source_public_url: &str, cdn: &CdnConfig) -> String {
    let base = source_public_url
        .split(['?', '#'])
        .next()
        .unwrap_or(source_public_url);
    let Ok(base) = Url::parse(base) else {
        log!("rewrite"; "unparseable stylesheet URL `{}`, urls left as-is", source_public_url);
        return css.to_string();
    };

    CSS_URL
        .replace_all(css, |caps: &regex::Captures<'_>| {
            let reference = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());

            if !is_relative_reference(reference) {
                return caps[0].to_string();
            }
            let Ok(absolute) = base.join(reference) else {
                return caps[0].to_string();
            };
            let rewritten = apply_cdn(absolute.as_str(), UrlCategory::Css, cdn);
            format!("url('{rewritten}')")
        })
        .into_owned()
}

/// A reference is relative when it has no scheme, is not protocol-relative
/// or root-absolute, and is not a bare fragment.
fn is_relative_reference(reference: &str) -> bool {
    !reference.is_empty()
        && !reference.starts_with('/')
        && !reference.starts_with('#')
        && !SCHEME.is_match(reference)
}
