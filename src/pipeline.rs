//! Asset pipeline orchestration: reference in, rewritten tag out.
//!
//! The host's render hook calls [`AssetPipeline::process`] once per
//! discovered style/script tag, passing the per-render [`RenderPass`] so
//! each logical handle is processed at most once per page. Every failure
//! path degrades to the original tag: a broken minifier or a filesystem
//! error must never break a page.

use rustc_hash::FxHashSet;
use std::borrow::Cow;
use std::sync::Arc;

use crate::config::{CdnConfig, Settings};
use crate::error::PipelineError;
use crate::kind::AssetKind;
use crate::log;
use crate::minify::{DefaultMinifier, Minify};
use crate::resolve::PathResolver;
use crate::rewrite::{self, UrlCategory};
use crate::store::ArtifactStore;

/// Tag substrings marking deferred/lazy loading by other conventions.
///
/// A tag carrying one of these is another scheme's responsibility and must
/// pass through unmodified.
const DEFERRED_MARKERS: &[&str] = &["lazyload", "loadcss"];

/// One discovered style/script reference, scoped to a single render pass.
#[derive(Debug, Clone)]
pub struct AssetReference {
    /// Logical handle within the host page-assembly system.
    pub handle: String,
    pub kind: AssetKind,
    /// Public URL as rendered into the tag (absolute or site-relative).
    pub url: String,
    /// The rendered tag text the host would otherwise emit.
    pub tag: String,
    /// Media attribute for stylesheets (`all` when absent).
    pub media: Option<String>,
}

/// Per-render-pass dedup set of already-processed handles.
///
/// Created fresh by the caller for every render pass; sharing one across
/// requests in a long-lived worker would incorrectly suppress reprocessing.
#[derive(Debug, Default)]
pub struct RenderPass {
    processed: FxHashSet<String>,
}

impl RenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_processed(&self, handle: &str) -> bool {
        self.processed.contains(handle)
    }

    #[inline]
    fn mark(&mut self, handle: &str) {
        self.processed.insert(handle.to_string());
    }
}

/// Orchestrator driving resolver, store, minifier and URL rewriter.
pub struct AssetPipeline {
    settings: Arc<Settings>,
    cdn: CdnConfig,
    resolver: PathResolver,
    store: ArtifactStore,
    minifier: Box<dyn Minify + Send + Sync>,
}

impl AssetPipeline {
    /// Build with the default oxc/lightningcss minifier.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_minifier(settings, Box::new(DefaultMinifier))
    }

    /// Build with a host-supplied minifier.
    pub fn with_minifier(settings: Arc<Settings>, minifier: Box<dyn Minify + Send + Sync>) -> Self {
        let cdn = settings.cdn();
        let resolver = PathResolver::from_settings(&settings);
        let store = ArtifactStore::from_settings(&settings);
        Self {
            settings,
            cdn,
            resolver,
            store,
            minifier,
        }
    }

    #[inline]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Process one discovered reference, returning the tag to emit.
    ///
    /// Returns the original tag unchanged when the reference is skipped
    /// (excluded, duplicate, already an artifact, deferred, cross-origin) or
    /// when any stage fails.
    pub fn process(&self, reference: &AssetReference, pass: &mut RenderPass) -> String {
        if self.should_skip(reference, pass) {
            return reference.tag.clone();
        }
        pass.mark(&reference.handle);

        let Some(source) = self.resolver.resolve(&reference.url) else {
            log!("pipeline"; "no local source for `{}`, serving original", reference.url);
            return reference.tag.clone();
        };

        match self.rewrite(reference, &source.path) {
            Ok(tag) => tag,
            Err(e) => {
                log!("error"; "{} `{}` falls back to original: {}", reference.kind, reference.handle, e);
                reference.tag.clone()
            }
        }
    }

    /// Skip rules evaluated before any filesystem work.
    fn should_skip(&self, reference: &AssetReference, pass: &RenderPass) -> bool {
        let enabled = match reference.kind {
            AssetKind::Css => self.settings.minify_css,
            AssetKind::Js => self.settings.minify_js,
        };
        if !enabled {
            return true;
        }
        if self.settings.is_excluded(reference.kind, &reference.handle) {
            return true;
        }
        if pass.is_processed(&reference.handle) {
            return true;
        }
        if is_artifact_url(&reference.url, reference.kind) {
            return true;
        }
        if has_deferred_marker(&reference.tag) {
            return true;
        }
        !is_local_url(&reference.url, &self.settings.site_url)
    }

    /// Minify, materialize, and render the rewritten tag.
    fn rewrite(
        &self,
        reference: &AssetReference,
        source_path: &std::path::Path,
    ) -> Result<String, PipelineError> {
        let source_public_url = self.absolute_url(&reference.url);
        let cdn = &self.cdn;

        let paths = self.store.get_or_create(
            reference.kind,
            &reference.handle,
            source_path,
            self.minifier.as_ref(),
            |minified| match reference.kind {
                AssetKind::Css => rewrite::rewrite_css_urls(&minified, &source_public_url, cdn),
                AssetKind::Js => minified,
            },
        )?;

        let file_name = paths
            .minified
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::NotFound(paths.minified.display().to_string()))?;
        let local_url = format!("{}/{}", self.settings.cache_url(), file_name);
        let category = match reference.kind {
            AssetKind::Css => UrlCategory::Css,
            AssetKind::Js => UrlCategory::Js,
        };
        let public_url = rewrite::apply_cdn(&local_url, category, cdn);

        Ok(self.render_tag(reference, &public_url))
    }

    /// Render the final tag for the artifact URL.
    fn render_tag(&self, reference: &AssetReference, url: &str) -> String {
        match reference.kind {
            // Non-blocking stylesheet: preload that swaps itself to a
            // stylesheet on load, with a noscript fallback.
            AssetKind::Css if self.settings.async_css => {
                let media = reference.media.as_deref().unwrap_or("all");
                format!(
                    r#"<link rel="preload" href="{url}" as="style" media="{media}" onload="this.onload=null;this.rel='stylesheet'"><noscript><link rel="stylesheet" href="{url}" media="{media}"></noscript>"#
                )
            }
            _ => reference.tag.replace(&reference.url, url),
        }
    }

    /// Absolute public URL of a reference (site-relative URLs get the origin).
    fn absolute_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("//") {
            url.to_string()
        } else {
            let origin = &self.settings.site_url;
            let path: Cow<'_, str> = if url.starts_with('/') {
                Cow::Borrowed(url)
            } else {
                Cow::Owned(format!("/{url}"))
            };
            format!("{origin}{path}")
        }
    }
}

/// Check if a URL already points at minified output.
fn is_artifact_url(url: &str, kind: AssetKind) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(&format!(".min.{}", kind.ext()))
}

/// Check for deferred/lazy-load markers from other schemes.
fn has_deferred_marker(tag: &str) -> bool {
    let lowered = tag.to_ascii_lowercase();
    DEFERRED_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Check if a URL belongs to the site origin.
fn is_local_url(url: &str, origin: &str) -> bool {
    if let Some(rest) = url.strip_prefix(origin)
        && !origin.is_empty()
        && (rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    {
        return true;
    }
    // Site-relative path: local. Protocol-relative or foreign scheme: not.
    !url.starts_with("//") && !url.contains("://")
}
