//! Pipeline settings: persisted options, sanitization, CDN snapshot.
//!
//! Settings live in a TOML file the host owns. On load and on save they run
//! through [`Settings::sanitize`] (boolean coercion is handled by serde, the
//! rest here: trailing-slash stripping, exclude-list normalization). The
//! process-wide snapshot lives in [`handle`] and is re-installed whenever the
//! host saves settings.

pub mod handle;

pub use handle::{install_settings, load_settings, save_settings, settings};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::kind::AssetKind;
use crate::rewrite::UrlCategory;

// ============================================================================
// Settings
// ============================================================================

/// Persisted pipeline settings.
///
/// Every field has a default so a partial TOML file (or an empty one) is
/// valid; unknown hosts only set what they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Site origin, e.g. `https://site.example`. No trailing slash.
    pub site_url: String,

    /// Public URL path under which `content_root` is served, e.g. `/content`.
    pub content_url: String,

    /// Ordered candidate roots for resolving public URLs to local files.
    pub site_root: PathBuf,
    pub content_root: PathBuf,
    pub extensions_root: PathBuf,
    pub theme_root: PathBuf,

    pub minify_css: bool,
    pub minify_js: bool,

    /// Handles excluded from minification (comma-separated string or list).
    pub exclude_css: ExcludeList,
    pub exclude_js: ExcludeList,

    /// Diagnostic logging toggle.
    pub enable_logging: bool,

    /// Emit the non-blocking preload/noscript variant for stylesheets.
    pub async_css: bool,

    /// Artifact max age in seconds for the periodic sweep (default 30 days).
    pub cache_lifetime: u64,

    /// Write a `.gz` sibling next to each minified artifact.
    pub enable_gzip: bool,

    pub enable_cdn: bool,
    /// CDN origin, e.g. `https://cdn.example`. No trailing slash.
    pub cdn_url: String,
    pub cdn_css: bool,
    pub cdn_js: bool,
    pub cdn_images: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            content_url: "/content".into(),
            site_root: PathBuf::new(),
            content_root: PathBuf::new(),
            extensions_root: PathBuf::new(),
            theme_root: PathBuf::new(),
            minify_css: true,
            minify_js: true,
            exclude_css: ExcludeList::default(),
            exclude_js: ExcludeList::default(),
            enable_logging: false,
            async_css: false,
            cache_lifetime: 2_592_000,
            enable_gzip: true,
            enable_cdn: false,
            cdn_url: String::new(),
            cdn_css: false,
            cdn_js: false,
            cdn_images: false,
        }
    }
}

impl Settings {
    /// Normalize persisted values in place.
    ///
    /// Runs on every load and save: strips trailing slashes from origin URLs
    /// and collapses exclude lists to trimmed, non-empty entries.
    pub fn sanitize(&mut self) {
        strip_trailing_slash(&mut self.site_url);
        strip_trailing_slash(&mut self.cdn_url);
        self.exclude_css.normalize();
        self.exclude_js.normalize();
    }

    /// Directory holding cache artifacts: `{content_root}/cache/minipress/`.
    pub fn cache_dir(&self) -> PathBuf {
        self.content_root
            .join("cache")
            .join(crate::store::CACHE_NAMESPACE)
    }

    /// Public URL of the cache directory (origin included).
    pub fn cache_url(&self) -> String {
        format!(
            "{}{}/cache/{}",
            self.site_url,
            self.content_url,
            crate::store::CACHE_NAMESPACE
        )
    }

    /// Check if a handle is excluded from minification for the given kind.
    pub fn is_excluded(&self, kind: AssetKind, handle: &str) -> bool {
        match kind {
            AssetKind::Css => self.exclude_css.contains(handle),
            AssetKind::Js => self.exclude_js.contains(handle),
        }
    }

    /// Build the immutable CDN snapshot used by all URL rewriting.
    pub fn cdn(&self) -> CdnConfig {
        CdnConfig {
            enabled: self.enable_cdn && !self.cdn_url.is_empty() && !self.site_url.is_empty(),
            origin: self.site_url.clone(),
            host: self.cdn_url.clone(),
            css: self.cdn_css,
            js: self.cdn_js,
            images: self.cdn_images,
        }
    }
}

fn strip_trailing_slash(url: &mut String) {
    while url.ends_with('/') {
        url.pop();
    }
}

// ============================================================================
// Exclude list
// ============================================================================

/// Handle exclude list accepting both TOML forms:
/// `exclude_css = "a, b"` and `exclude_css = ["a", "b"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExcludeList {
    Csv(String),
    List(Vec<String>),
}

impl Default for ExcludeList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ExcludeList {
    /// Collapse to the list form: split on commas, trim, drop empty entries.
    pub fn normalize(&mut self) {
        let entries = self.entries();
        *self = Self::List(entries);
    }

    /// All entries, trimmed, empty ones dropped.
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Csv(s) => s.split(',').collect(),
            Self::List(v) => v.iter().map(String::as_str).collect(),
        };
        raw.iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, handle: &str) -> bool {
        match self {
            Self::Csv(s) => s.split(',').any(|e| e.trim() == handle),
            Self::List(v) => v.iter().any(|e| e.trim() == handle),
        }
    }
}

// ============================================================================
// CDN snapshot
// ============================================================================

/// Precomputed CDN substitution config.
///
/// Built once per settings snapshot and threaded explicitly into each
/// component; immutable for the life of that snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub enabled: bool,
    /// Exact site origin to match, no trailing slash.
    pub origin: String,
    /// Replacement host, no trailing slash.
    pub host: String,
    pub css: bool,
    pub js: bool,
    pub images: bool,
}

impl CdnConfig {
    /// A disabled snapshot (every substitution is a no-op).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            origin: String::new(),
            host: String::new(),
            css: false,
            js: false,
            images: false,
        }
    }

    /// Check whether substitution applies to a URL category.
    #[inline]
    pub fn applies_to(&self, category: UrlCategory) -> bool {
        match category {
            UrlCategory::Css => self.css,
            UrlCategory::Js => self.js,
            UrlCategory::Image => self.images,
        }
    }
}

/// Parse settings from TOML text (sanitized).
pub fn from_toml(text: &str) -> Result<Settings, toml::de::Error> {
    let mut settings: Settings = toml::from_str(text)?;
    settings.sanitize();
    Ok(settings)
}

/// Serialize settings to TOML text.
pub fn to_toml(settings: &Settings) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(settings)
}
