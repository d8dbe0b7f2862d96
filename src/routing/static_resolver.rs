//! Static file resolution against the document root.
//!
//! # Responsibilities
//! - Expand a URL path into the candidate files a static host would try
//! - Report whether any candidate exists as a regular file
//!
//! # Design Decisions
//! - Pure apart from `stat` calls; stat errors mean "does not exist"
//! - Paths with a known asset extension never expand (avoids dual lookups
//!   for missing assets)
//! - Candidates that would climb out of the root never exist

use std::path::{Component, Path, PathBuf};

/// Extensions that are served as-is, without `.html`/`index.html` variants.
const ASSET_EXTENSIONS: &[&str] = &[
    "html", "htm", "png", "jpg", "js", "css", "svg", "gif", "ico", "woff", "woff2",
];

/// Resolves URL paths to files under a document root.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    root: PathBuf,
}

impl StaticResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if `path` or one of its alternatives is a file under the root.
    pub async fn is_static(&self, path: &str) -> bool {
        for candidate in candidates(path) {
            if self.exists(&candidate).await {
                return true;
            }
        }
        false
    }

    /// True only for a regular file; any stat error counts as missing.
    pub async fn exists(&self, candidate: &str) -> bool {
        let Some(file) = self.resolve(candidate) else {
            return false;
        };
        match tokio::fs::metadata(&file).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    fn resolve(&self, candidate: &str) -> Option<PathBuf> {
        let relative = Path::new(candidate.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

/// The original path followed by its alternatives.
pub fn candidates(path: &str) -> Vec<String> {
    let mut all = Vec::with_capacity(5);
    all.push(path.to_string());
    all.extend(alternatives(path));
    all
}

/// Fallback paths tried, in order, after the original path is not found.
pub fn alternatives(path: &str) -> Vec<String> {
    if let Some(stem) = path.strip_suffix('/') {
        let mut paths = Vec::with_capacity(4);
        if !stem.is_empty() {
            paths.push(format!("{stem}.html"));
            paths.push(format!("{stem}.htm"));
        }
        paths.push(format!("{path}index.html"));
        paths.push(format!("{path}index.htm"));
        paths
    } else if !has_asset_extension(path) {
        vec![
            format!("{path}.html"),
            format!("{path}.htm"),
            format!("{path}/index.html"),
            format!("{path}/index.htm"),
        ]
    } else {
        Vec::new()
    }
}

fn has_asset_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| ASSET_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_path_alternatives() {
        assert_eq!(
            candidates("/blog/"),
            vec!["/blog/", "/blog.html", "/blog.htm", "/blog/index.html", "/blog/index.htm"]
        );
        assert_eq!(
            alternatives("/blog/"),
            vec!["/blog.html", "/blog.htm", "/blog/index.html", "/blog/index.htm"]
        );
    }

    #[test]
    fn root_path_alternatives() {
        assert_eq!(alternatives("/"), vec!["/index.html", "/index.htm"]);
    }

    #[test]
    fn extensionless_path_alternatives() {
        assert_eq!(
            alternatives("/about"),
            vec!["/about.html", "/about.htm", "/about/index.html", "/about/index.htm"]
        );
        // Unknown extensions still expand.
        assert_eq!(alternatives("/data.json").len(), 4);
    }

    #[test]
    fn asset_paths_do_not_expand() {
        assert_eq!(candidates("/app.js"), vec!["/app.js"]);
        assert!(alternatives("/img/logo.woff2").is_empty());
        assert!(alternatives("/missing.png").is_empty());
    }

    #[tokio::test]
    async fn detects_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "<h1>blog</h1>").unwrap();
        std::fs::write(dir.path().join("about.html"), "about").unwrap();

        let resolver = StaticResolver::new(dir.path());
        assert!(resolver.is_static("/blog/").await);
        assert!(resolver.is_static("/blog").await);
        assert!(resolver.is_static("/about").await);
        assert!(!resolver.is_static("/contact").await);

        // Directories are not files.
        assert!(!resolver.exists("/blog").await);
        assert!(resolver.exists("/blog/index.html").await);
    }

    #[tokio::test]
    async fn parent_segments_never_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("secret.html"), "x").unwrap();

        let resolver = StaticResolver::new(dir.path().join("public"));
        assert!(!resolver.exists("/../secret.html").await);
    }
}
