//! Pipeline error taxonomy.
//!
//! Every failure the pipeline can hit is a typed value consumed by the
//! fall-back logic in [`crate::pipeline`]: a failed asset degrades to its
//! original, unminified reference and never surfaces to the render path.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors recovered at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No candidate root yields a readable file for the public URL.
    #[error("no local file found for `{0}`")]
    NotFound(String),

    #[error("io error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("minification failed: {0}")]
    Minify(#[from] MinifyError),
}

impl PipelineError {
    /// Wrap an io error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// External minifier failure (parse error, printer error).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MinifyError(pub String);
