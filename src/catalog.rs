//! Catalog of previously published artifacts.
//!
//! The documentation directory is the source of truth for what has
//! already been produced: one `{slug}.md` file per published module.
//! The catalog is a snapshot taken at topic-selection time, not a live
//! view; two items in the same batch cannot collide because uniqueness
//! is enforced once against this snapshot.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::info;

/// Snapshot of published artifact slugs.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    slugs: HashSet<String>,
}

impl Catalog {
    /// Builds a catalog by scanning the documentation directory.
    ///
    /// A missing directory is an empty catalog, not an error: on a fresh
    /// workspace nothing has been published yet.
    pub fn scan(doc_dir: &Path) -> io::Result<Self> {
        if !doc_dir.exists() {
            return Ok(Self::default());
        }

        let mut slugs = HashSet::new();
        for entry in doc_dir.read_dir()? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    slugs.insert(stem.to_string());
                }
            }
        }

        info!(published = slugs.len(), "Scanned existing module library");
        Ok(Self { slugs })
    }

    /// Builds a catalog from an explicit slug list (used in tests).
    pub fn from_slugs(slugs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `slug` has already been published.
    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }

    /// Number of published artifacts in the snapshot.
    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    /// Returns true if nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    /// Iterates over the published slugs.
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.slugs.iter().map(String::as_str)
    }
}
