//! On-disk artifact store: atomic materialization, gzip siblings, eviction.
//!
//! Artifacts are content-hash addressed: `{kind}-{handle}-{key}.min.{ext}`,
//! with an optional `{...}.gz` sibling. A content change produces a new key
//! and hence a new file; old files are reclaimed by the age sweep. Writes go
//! to a temporary name and are renamed into place, so a concurrent reader
//! never observes a partially written artifact. Concurrent writers of the
//! same key redo identical work and the last rename wins.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::freshness;
use crate::kind::AssetKind;
use crate::log;
use crate::minify::Minify;

/// Cache directory namespace: `{content_root}/cache/minipress/`.
pub const CACHE_NAMESPACE: &str = "minipress";

/// Paths of a materialized artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub minified: PathBuf,
    pub compressed: Option<PathBuf>,
}

/// Content-hash-addressed artifact cache on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cache_dir: PathBuf,
    gzip: bool,
}

impl ArtifactStore {
    pub fn new(cache_dir: PathBuf, gzip: bool) -> Self {
        Self { cache_dir, gzip }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.cache_dir(), settings.enable_gzip)
    }

    #[inline]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Deterministic artifact filename for a (kind, handle, key) triple.
    pub fn artifact_name(kind: AssetKind, handle: &str, key: &str) -> String {
        format!("{}-{}-{}.min.{}", kind.as_str(), handle, key, kind.ext())
    }

    /// Return a fresh artifact for the source, creating it when absent/stale.
    ///
    /// `postprocess` runs over the minified text before it is written (the
    /// pipeline uses it for CSS `url()` rewriting); it must be deterministic
    /// for a given source so concurrent regenerations stay content-identical.
    pub fn get_or_create<F>(
        &self,
        kind: AssetKind,
        handle: &str,
        source: &Path,
        minifier: &dyn Minify,
        postprocess: F,
    ) -> Result<ArtifactPaths, PipelineError>
    where
        F: FnOnce(String) -> String,
    {
        let source_mtime = freshness::mtime(source)
            .ok_or_else(|| PipelineError::NotFound(source.display().to_string()))?;

        // Fast staleness pre-check: if the newest artifact for this handle is
        // at least as new as the source, reuse it without paying for a hash.
        let prefix = format!("{}-{}-", kind.as_str(), handle);
        if let Some((existing, artifact_mtime)) = self.newest_artifact(&prefix, kind.ext())
            && artifact_mtime >= source_mtime
        {
            return self.paths_for(existing);
        }

        // Exact-key lookup: a key match means the bytes are unchanged, so the
        // artifact is valid even when the source was merely touched.
        let key = freshness::cache_key(source).map_err(PipelineError::io(source))?;
        let final_path = self.cache_dir.join(Self::artifact_name(kind, handle, &key));
        if final_path.is_file() {
            return self.paths_for(final_path);
        }

        // Miss: minify and materialize.
        fs::create_dir_all(&self.cache_dir).map_err(PipelineError::io(&self.cache_dir))?;
        let text = fs::read_to_string(source).map_err(PipelineError::io(source))?;
        let minified = minifier.minify(kind, &text)?;
        let output = postprocess(minified);

        self.write_atomic(&final_path, output.as_bytes())
            .map_err(PipelineError::io(&final_path))?;

        let compressed = if self.gzip {
            let gz = gz_sibling(&final_path);
            self.write_gz_atomic(&gz, output.as_bytes())
                .map_err(PipelineError::io(&gz))?;
            Some(gz)
        } else {
            None
        };

        log!("store"; "materialized {} ({} bytes)", final_path.display(), output.len());
        Ok(ArtifactPaths {
            minified: final_path,
            compressed,
        })
    }

    /// Build the paths for an existing artifact, restoring a missing `.gz`
    /// sibling so the compressed variant always pairs its minified file.
    fn paths_for(&self, minified: PathBuf) -> Result<ArtifactPaths, PipelineError> {
        let compressed = if self.gzip {
            let gz = gz_sibling(&minified);
            if !gz.is_file() {
                let bytes = fs::read(&minified).map_err(PipelineError::io(&minified))?;
                self.write_gz_atomic(&gz, &bytes)
                    .map_err(PipelineError::io(&gz))?;
            }
            Some(gz)
        } else {
            None
        };
        Ok(ArtifactPaths {
            minified,
            compressed,
        })
    }

    /// Find the newest artifact matching `{prefix}{key}.min.{ext}`.
    ///
    /// The segment between prefix and suffix must be exactly a cache key
    /// (16 lowercase hex chars), otherwise handle `main` would also match
    /// the artifacts of handle `main-nav`.
    fn newest_artifact(&self, prefix: &str, ext: &str) -> Option<(PathBuf, SystemTime)> {
        let suffix = format!(".min.{ext}");
        let entries = fs::read_dir(&self.cache_dir).ok()?;

        let mut newest: Option<(PathBuf, SystemTime)> = None;
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(key) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            else {
                continue;
            };
            if key.len() != 16 || !key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
                continue;
            }
            let Some(mtime) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            if newest.as_ref().is_none_or(|(_, t)| mtime > *t) {
                newest = Some((entry.path(), mtime));
            }
        }
        newest
    }

    /// Write bytes to a temporary name, then rename into place.
    fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = tmp_sibling(final_path);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, final_path)
    }

    /// Gzip bytes at maximum compression to a temporary name, then rename.
    fn write_gz_atomic(&self, final_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = tmp_sibling(final_path);
        let file = File::create(&tmp)?;
        let mut encoder = GzEncoder::new(file, Compression::best());
        encoder.write_all(bytes)?;
        encoder.finish()?;
        fs::rename(&tmp, final_path)
    }

    /// Delete cache entries older than `max_age`, returning the count.
    ///
    /// A missing cache directory counts as zero files. Races with other
    /// sweepers are tolerated: a file deleted underneath us still counts.
    pub fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut deleted = 0;
        for entry in entries.filter_map(Result::ok) {
            let Some(mtime) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            let age = now.duration_since(mtime).unwrap_or_default();
            if age >= max_age {
                match fs::remove_file(entry.path()) {
                    Ok(()) => deleted += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => deleted += 1,
                    Err(_) => {}
                }
            }
        }
        log!("store"; "sweep removed {} entries", deleted);
        Ok(deleted)
    }

    /// Delete every cache entry, returning the count.
    pub fn purge_all(&self) -> io::Result<usize> {
        self.sweep(Duration::ZERO)
    }
}

fn gz_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Writer-unique temporary name next to the final path (same filesystem, so
/// the rename is atomic). Unique per process and per write, so concurrent
/// regenerations never scribble on each other's temp file.
fn tmp_sibling(path: &Path) -> PathBuf {
    static TMP_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MinifyError;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::thread;
    use tempfile::TempDir;

    /// Deterministic stub that uppercases, so tests can observe the transform
    /// without depending on a real minifier.
    struct Upper;

    impl Minify for Upper {
        fn minify_css(&self, source: &str) -> Result<String, MinifyError> {
            Ok(source.to_uppercase())
        }
        fn minify_js(&self, source: &str) -> Result<String, MinifyError> {
            Ok(source.to_uppercase())
        }
    }

    struct Failing;

    impl Minify for Failing {
        fn minify_css(&self, _: &str) -> Result<String, MinifyError> {
            Err(MinifyError("boom".into()))
        }
        fn minify_js(&self, _: &str) -> Result<String, MinifyError> {
            Err(MinifyError("boom".into()))
        }
    }

    fn store_at(dir: &TempDir, gzip: bool) -> (ArtifactStore, PathBuf) {
        let source = dir.path().join("style.css");
        fs::write(&source, "body { color: red; }").unwrap();
        (
            ArtifactStore::new(dir.path().join("cache"), gzip),
            source,
        )
    }

    fn count_entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|e| e.count()).unwrap_or(0)
    }

    #[test]
    fn test_get_or_create_materializes() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);

        let paths = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        assert!(paths.minified.is_file());
        assert!(paths.compressed.is_none());

        let name = paths.minified.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("css-main-"));
        assert!(name.ends_with(".min.css"));
        assert_eq!(
            fs::read_to_string(&paths.minified).unwrap(),
            "BODY { COLOR: RED; }"
        );
    }

    #[test]
    fn test_get_or_create_idempotent() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);

        let first = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        let mtime_before = freshness::mtime(&first.minified).unwrap();

        thread::sleep(Duration::from_millis(10));
        let second = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();

        // Same path, no rewrite on the second call.
        assert_eq!(first.minified, second.minified);
        assert_eq!(freshness::mtime(&second.minified).unwrap(), mtime_before);
        assert_eq!(count_entries(store.cache_dir()), 1);
    }

    #[test]
    fn test_content_change_creates_new_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);

        let first = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        let old_content = fs::read_to_string(&first.minified).unwrap();

        thread::sleep(Duration::from_millis(10));
        fs::write(&source, "body { color: blue; }").unwrap();
        let second = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();

        // New key, new file; the old artifact is left untouched.
        assert_ne!(first.minified, second.minified);
        assert!(first.minified.is_file());
        assert_eq!(fs::read_to_string(&first.minified).unwrap(), old_content);
        assert_eq!(count_entries(store.cache_dir()), 2);
    }

    #[test]
    fn test_touched_but_identical_source_reuses_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);

        let first = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();

        thread::sleep(Duration::from_millis(10));
        // Rewrite identical bytes: mtime changes, key does not.
        fs::write(&source, "body { color: red; }").unwrap();
        let second = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();

        assert_eq!(first.minified, second.minified);
        assert_eq!(count_entries(store.cache_dir()), 1);
    }

    #[test]
    fn test_gzip_sibling_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, true);

        let paths = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        let gz = paths.compressed.unwrap();
        assert!(gz.is_file());
        assert!(gz.to_str().unwrap().ends_with(".min.css.gz"));

        let mut decoder = GzDecoder::new(File::open(&gz).unwrap());
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, fs::read_to_string(&paths.minified).unwrap());
    }

    #[test]
    fn test_postprocess_applies_before_write() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);

        let paths = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| {
                s.replace("RED", "GREEN")
            })
            .unwrap();
        assert_eq!(
            fs::read_to_string(&paths.minified).unwrap(),
            "BODY { COLOR: GREEN; }"
        );
    }

    #[test]
    fn test_minify_failure_propagates_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, true);

        let err = store
            .get_or_create(AssetKind::Css, "main", &source, &Failing, |s| s)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Minify(_)));
        assert_eq!(count_entries(store.cache_dir()), 0);
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("cache"), false);

        let err = store
            .get_or_create(
                AssetKind::Js,
                "app",
                Path::new("/nonexistent/app.js"),
                &Upper,
                |s| s,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_sweep_zero_age_purges_everything() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, true);
        store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        assert_eq!(count_entries(store.cache_dir()), 2);

        let deleted = store.sweep(Duration::ZERO).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(count_entries(store.cache_dir()), 0);

        // Second sweep on the empty directory succeeds with zero.
        assert_eq!(store.sweep(Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_sweep_missing_dir_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("never-created"), false);
        assert_eq!(store.sweep(Duration::ZERO).unwrap(), 0);
        assert_eq!(store.purge_all().unwrap(), 0);
    }

    #[test]
    fn test_sweep_keeps_young_entries() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, false);
        store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();

        let deleted = store.sweep(Duration::from_secs(3600)).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(count_entries(store.cache_dir()), 1);
    }

    #[test]
    fn test_concurrent_writers_converge() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, true);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let source = source.clone();
                thread::spawn(move || {
                    store
                        .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<ArtifactPaths> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Every writer lands on the identical artifact path.
        for paths in &results {
            assert_eq!(paths.minified, results[0].minified);
        }
        // Exactly one .min.css/.gz pair, no leftover temp files.
        let names: Vec<String> = fs::read_dir(store.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected cache entries: {names:?}");
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
        assert_eq!(
            fs::read_to_string(&results[0].minified).unwrap(),
            "BODY { COLOR: RED; }"
        );
    }

    #[test]
    fn test_handle_prefix_does_not_borrow_other_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("cache"), false);

        let nav_source = dir.path().join("nav.css");
        let main_source = dir.path().join("main.css");
        fs::write(&main_source, "body { color: red; }").unwrap();
        thread::sleep(Duration::from_millis(10));
        fs::write(&nav_source, "nav { color: blue; }").unwrap();

        // "main-nav"'s artifact is newer than "main"'s source and its name
        // starts with the "css-main-" prefix. It must not satisfy "main".
        let nav = store
            .get_or_create(AssetKind::Css, "main-nav", &nav_source, &Upper, |s| s)
            .unwrap();
        let main = store
            .get_or_create(AssetKind::Css, "main", &main_source, &Upper, |s| s)
            .unwrap();

        assert_ne!(main.minified, nav.minified);
        assert_eq!(
            fs::read_to_string(&main.minified).unwrap(),
            "BODY { COLOR: RED; }"
        );
        assert_eq!(count_entries(store.cache_dir()), 2);
    }

    #[test]
    fn test_gz_restored_for_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, source) = store_at(&dir, true);

        let paths = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        fs::remove_file(paths.compressed.as_ref().unwrap()).unwrap();

        let again = store
            .get_or_create(AssetKind::Css, "main", &source, &Upper, |s| s)
            .unwrap();
        assert!(again.compressed.unwrap().is_file());
    }
}
