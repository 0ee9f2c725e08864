//! Post-render content rewriting: image URLs in markup and srcset entries.
//!
//! Runs independently of the asset pipeline, over fully rendered fragments.
//! Entirely a no-op when CDN or the image category is disabled - checked
//! before any scan so disabled sites pay nothing per render.

use parking_lot::Mutex;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::{UrlCategory, apply_cdn};
use crate::config::CdnConfig;

/// Image extensions eligible for CDN substitution (case-insensitive).
const IMAGE_EXTENSIONS: &str = "jpg|jpeg|png|gif|webp|avif|svg|bmp|tiff|ico";

/// One responsive-image candidate: URL plus its width/density descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetSource {
    pub url: String,
    /// `w` or `x` descriptor as rendered into the srcset attribute.
    pub descriptor: String,
}

/// Memoized origin-scoped image regex (origins change only on settings save).
static IMAGE_RE: LazyLock<Mutex<Option<(String, Regex)>>> = LazyLock::new(|| Mutex::new(None));

fn image_url_regex(origin: &str) -> Regex {
    let mut cached = IMAGE_RE.lock();
    if let Some((cached_origin, re)) = cached.as_ref()
        && cached_origin == origin
    {
        return re.clone();
    }
    // The trailing group anchors the extension at the end of the URL, so
    // `/a.pngx` is not treated as an image. The terminator is captured and
    // re-emitted by the caller.
    let pattern = format!(
        r#"(?i)({}/[^\s"'<>]+\.(?:{}))([\s"'<>?#]|$)"#,
        regex::escape(origin),
        IMAGE_EXTENSIONS
    );
    let re = Regex::new(&pattern).expect("escaped origin regex");
    *cached = Some((origin.to_string(), re.clone()));
    re
}

/// Rewrite site-origin image URLs in rendered markup to the CDN host.
pub fn rewrite_content<'a>(markup: &'a str, cdn: &CdnConfig) -> Cow<'a, str> {
    if !cdn.enabled || !cdn.images || cdn.origin.is_empty() {
        return Cow::Borrowed(markup);
    }
    let re = image_url_regex(&cdn.origin);
    re.replace_all(markup, |caps: &regex::Captures<'_>| {
        format!("{}{}", apply_cdn(&caps[1], UrlCategory::Image, cdn), &caps[2])
    })
}

/// Rewrite the URL of every srcset entry in place.
pub fn rewrite_srcset(sources: &mut BTreeMap<u32, SrcsetSource>, cdn: &CdnConfig) {
    if !cdn.enabled || !cdn.images {
        return;
    }
    for source in sources.values_mut() {
        if let Cow::Owned(rewritten) = apply_cdn(&source.url, UrlCategory::Image, cdn) {
            source.url = rewritten;
        }
    }
}
