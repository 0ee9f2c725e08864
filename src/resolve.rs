//! Public URL to local file resolution.
//!
//! Probes an ordered list of candidate root directories for the URL path.
//! The order (site, content, extensions, theme) is a performance heuristic,
//! not a correctness requirement: first readable match wins.

use percent_encoding::percent_decode_str;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::config::Settings;

/// A public URL resolved to a readable local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub path: PathBuf,
    pub mtime: SystemTime,
}

/// Ordered-root resolver for public asset URLs.
#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: Vec<PathBuf>,
}

impl PathResolver {
    /// Build from settings, skipping unconfigured (empty) roots.
    pub fn from_settings(settings: &Settings) -> Self {
        let roots = [
            &settings.site_root,
            &settings.content_root,
            &settings.extensions_root,
            &settings.theme_root,
        ]
        .into_iter()
        .filter(|r| !r.as_os_str().is_empty())
        .cloned()
        .collect();
        Self { roots }
    }

    /// Build from an explicit ordered root list.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Resolve a public URL to the first readable file under a root.
    ///
    /// The URL may be absolute (`https://site.example/a/b.css`) or
    /// site-relative (`/a/b.css`); query strings and fragments are ignored.
    pub fn resolve(&self, public_url: &str) -> Option<ResolvedSource> {
        let rel = url_path(public_url);
        if rel.is_empty() {
            return None;
        }

        for root in &self.roots {
            let candidate = root.join(&rel);
            if let Ok(meta) = candidate.metadata()
                && meta.is_file()
                && let Ok(mtime) = meta.modified()
            {
                return Some(ResolvedSource {
                    path: candidate,
                    mtime,
                });
            }
        }
        None
    }
}

/// Extract the decoded, left-trimmed URL path from a public URL.
fn url_path(public_url: &str) -> String {
    // Strip query and fragment first.
    let trimmed = public_url
        .split(['?', '#'])
        .next()
        .unwrap_or(public_url);

    // Drop scheme + host for absolute and protocol-relative URLs.
    let path = if let Some(rest) = trimmed.split_once("://").map(|(_, r)| r) {
        rest.split_once('/').map_or("", |(_, p)| p)
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        rest.split_once('/').map_or("", |(_, p)| p)
    } else {
        trimmed.trim_start_matches('/')
    };

    percent_decode_str(path)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_url_path_forms() {
        assert_eq!(url_path("/a/b.css"), "a/b.css");
        assert_eq!(url_path("/a/b.css?v=3"), "a/b.css");
        assert_eq!(url_path("https://site.example/a/b.css"), "a/b.css");
        assert_eq!(url_path("//site.example/a/b.css"), "a/b.css");
        assert_eq!(url_path("/a/hello%20world.css"), "a/hello world.css");
        assert_eq!(url_path("https://site.example"), "");
    }

    #[test]
    fn test_resolve_probe_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(first.join("js")).unwrap();
        fs::create_dir_all(second.join("js")).unwrap();
        fs::write(first.join("js/app.js"), "one").unwrap();
        fs::write(second.join("js/app.js"), "two").unwrap();

        let resolver = PathResolver::new(vec![first.clone(), second]);
        let resolved = resolver.resolve("/js/app.js").unwrap();
        assert_eq!(resolved.path, first.join("js/app.js"));
    }

    #[test]
    fn test_resolve_falls_through_to_later_root() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(second.join("css")).unwrap();
        fs::write(second.join("css/style.css"), "body{}").unwrap();

        let resolver = PathResolver::new(vec![first, second.clone()]);
        let resolved = resolver
            .resolve("https://site.example/css/style.css?ver=1")
            .unwrap();
        assert_eq!(resolved.path, second.join("css/style.css"));
    }

    #[test]
    fn test_resolve_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(vec![dir.path().to_path_buf()]);
        assert!(resolver.resolve("/missing.css").is_none());
    }

    #[test]
    fn test_resolve_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        let resolver = PathResolver::new(vec![dir.path().to_path_buf()]);
        assert!(resolver.resolve("/css").is_none());
    }

    #[test]
    fn test_from_settings_skips_empty_roots() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.js"), "x").unwrap();

        let settings = Settings {
            content_root: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let resolver = PathResolver::from_settings(&settings);
        assert!(resolver.resolve("/app.js").is_some());
    }
}
