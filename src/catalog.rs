//! Session video catalog.

use crate::error::{ReelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One playable video: display title plus a storage reference or URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub source: String,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
        }
    }
}

/// A catalog entry chosen by title lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVideo {
    pub title: String,
    pub index: usize,
}

/// Ordered, immutable list of videos for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoCatalog {
    entries: Vec<CatalogEntry>,
}

impl VideoCatalog {
    /// Build a catalog, rejecting blank and exactly repeated titles.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::Catalog`] for a blank or duplicate title.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let title = entry.title.trim();
            if title.is_empty() {
                return Err(ReelError::Catalog("video title must not be empty".into()));
            }
            if !seen.insert(title) {
                return Err(ReelError::Catalog(format!("duplicate video title: {title}")));
            }
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Find a title: exact match first, then case-insensitive.
    #[must_use]
    pub fn resolve(&self, title: &str) -> Option<ResolvedVideo> {
        let wanted = title.trim();
        if wanted.is_empty() {
            return None;
        }
        let index = self
            .entries
            .iter()
            .position(|e| e.title.trim() == wanted)
            .or_else(|| {
                let lowered = wanted.to_lowercase();
                self.entries
                    .iter()
                    .position(|e| e.title.trim().to_lowercase() == lowered)
            })?;
        Some(self.resolved_at(index))
    }

    /// The entry after `index`, wrapping to the first.
    #[must_use]
    pub fn next_after(&self, index: usize) -> Option<ResolvedVideo> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.resolved_at((index + 1) % self.entries.len()))
    }

    fn resolved_at(&self, index: usize) -> ResolvedVideo {
        ResolvedVideo {
            title: self.entries[index].title.trim().to_owned(),
            index,
        }
    }
}
