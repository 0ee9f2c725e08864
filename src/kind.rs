//! Asset kind: the two reference classes the pipeline minifies.

use serde::{Deserialize, Serialize};

/// Kind of a processed asset reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Css,
    Js,
}

impl AssetKind {
    /// Short name used in artifact filenames (`css-{handle}-{key}.min.css`).
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    /// File extension of the minified artifact.
    #[inline]
    pub const fn ext(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str() {
        assert_eq!(AssetKind::Css.as_str(), "css");
        assert_eq!(AssetKind::Js.as_str(), "js");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", AssetKind::Css), "css");
    }
}
