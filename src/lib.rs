//! Minipress - a cache-keyed asset pipeline for CSS/JS references.
//!
//! Given references to CSS/JS source files discovered during page assembly,
//! minipress produces minified, content-hash-addressed, optionally gzipped
//! cache artifacts, and rewrites references to point at those artifacts
//! (optionally through a CDN host). Embedded resource URLs are rewritten to
//! match: relative `url()` references inside minified CSS become absolute,
//! and image URLs in rendered markup are swapped to the CDN host.
//!
//! The host framework drives the pipeline: it calls
//! [`AssetPipeline::process`] once per discovered style/script tag and
//! [`rewrite::content::rewrite_content`] over rendered markup fragments.
//! Minification failures never break a page - the pipeline always falls
//! back to the original, unminified reference.

pub mod config;
pub mod error;
pub mod freshness;
pub mod kind;
pub mod logger;
pub mod minify;
pub mod pipeline;
pub mod resolve;
pub mod rewrite;
pub mod store;

pub use config::{CdnConfig, Settings, install_settings, settings};
pub use error::PipelineError;
pub use kind::AssetKind;
pub use minify::{DefaultMinifier, Minify};
pub use pipeline::{AssetPipeline, AssetReference, RenderPass};
pub use resolve::{PathResolver, ResolvedSource};
pub use rewrite::{UrlCategory, apply_cdn};
pub use store::{ArtifactPaths, ArtifactStore};
