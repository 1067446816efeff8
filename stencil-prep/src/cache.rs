//! Cache of prepared templates keyed by source path
//!
//! Entries are re-prepared whenever the source file's modification time or
//! size changes. A replaced handle is released once the last caller holding
//! its `Arc` lets go of it.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;

use crate::error::PrepareError;
use crate::factory::TemplateFactory;
use crate::template::PreparedTemplate;

/// What the cache remembers about a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CachedTemplate {
    template: Arc<PreparedTemplate>,
    fingerprint: Fingerprint,
}

impl CachedTemplate {
    fn is_fresh(&self, path: &Path) -> bool {
        self.template.is_valid()
            && Fingerprint::of(path).is_ok_and(|current| current == self.fingerprint)
    }
}

/// Thread-safe cache of prepared templates
#[derive(Clone)]
pub struct TemplateCache {
    factory: TemplateFactory,
    entries: Arc<DashMap<PathBuf, CachedTemplate>>,
}

impl TemplateCache {
    pub fn new(factory: TemplateFactory) -> Self {
        Self {
            factory,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Return the cached template for `path`, preparing it if needed.
    pub fn get_or_prepare(&self, path: &Path) -> Result<Arc<PreparedTemplate>, PrepareError> {
        self.factory.resolve(path)?;
        let fingerprint = Fingerprint::of(path).map_err(|source| {
            self.entries.remove(path);
            PrepareError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if let Some(entry) = self.entries.get(path)
            && entry.fingerprint == fingerprint
            && entry.template.is_valid()
        {
            return Ok(Arc::clone(&entry.template));
        }

        let template = match self.factory.prepare_file(path) {
            Ok(template) => Arc::new(template),
            Err(e) => {
                self.entries.remove(path);
                return Err(e);
            }
        };
        let previous = self.entries.insert(
            path.to_path_buf(),
            CachedTemplate {
                template: Arc::clone(&template),
                fingerprint,
            },
        );
        if previous.is_some() {
            tracing::debug!("Refreshed cached template {}", path.display());
        }
        Ok(template)
    }

    /// Drop the entry for `path`. Returns whether one existed.
    pub fn evict(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries whose source file changed, vanished, or whose
    /// template was released.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_stale(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, entry| entry.is_fresh(path));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(
                "Cleaned up {} stale cached templates ({} remaining)",
                removed,
                self.entries.len()
            );
        }
        removed
    }

    /// Get statistics about the cache contents
    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let stale = self
            .entries
            .iter()
            .filter(|entry| !entry.is_fresh(entry.key()))
            .count();
        CacheStats {
            total_entries: total,
            stale_entries: stale,
            fresh_entries: total.saturating_sub(stale),
        }
    }
}

/// Statistics about cache contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries in the cache
    pub total_entries: usize,
    /// Entries that would be re-prepared on next access
    pub stale_entries: usize,
    /// Entries that can be served as they are
    pub fresh_entries: usize,
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CacheStats {{ total: {}, stale: {}, fresh: {} }}",
            self.total_entries, self.stale_entries, self.fresh_entries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::markup::MarkupBackend;
    use crate::backend::{ParseResult, ParsingBackend};
    use crate::formats::DocumentFormat;
    use crate::scratch;
    use serial_test::serial;
    use std::fs::File;
    use std::io::Read;
    use std::time::Duration;

    /// Unpacks every template into a fresh scratch directory
    struct ScratchBackend;

    impl ParsingBackend for ScratchBackend {
        fn parse(&self, _format: DocumentFormat, input: &mut dyn Read) -> anyhow::Result<ParseResult> {
            let dir = tempfile::Builder::new()
                .prefix("stencil-cache-")
                .tempdir()?
                .keep();
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            std::fs::write(dir.join("content.xml"), &text)?;
            Ok(ParseResult::new()
                .with_variables(["name"])
                .with_scratch_dir(dir))
        }
    }

    fn cache() -> TemplateCache {
        TemplateCache::new(TemplateFactory::new(MarkupBackend::new()))
    }

    fn write_template(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Rewrite the file and push its mtime forward so the change is visible
    fn touch(path: &Path, content: &str, secs: u64) {
        std::fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_same_handle_for_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.txt", "{%= name %}");
        let cache = cache();

        let first = cache.get_or_prepare(&path).unwrap();
        let second = cache.get_or_prepare(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_file_is_prepared_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.txt", "{%= name %}");
        let cache = cache();

        let first = cache.get_or_prepare(&path).unwrap();
        touch(&path, "{%= name %} {%= title %}", 60);
        let second = cache.get_or_prepare(&path).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.variables().contains("title"));
        // The old handle stays usable for whoever still holds it
        assert!(first.is_valid());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_released_entry_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.txt", "{%= name %}");
        let cache = cache();

        let first = cache.get_or_prepare(&path).unwrap();
        first.release();
        let second = cache.get_or_prepare(&path).unwrap();
        assert!(second.is_valid());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unsupported_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "report.pdf", "%PDF-1.7");
        let cache = cache();

        let err = cache.get_or_prepare(&path).unwrap_err();
        assert!(matches!(err, PrepareError::UnsupportedFormat { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.txt", "{%= name %}");
        let cache = cache();

        cache.get_or_prepare(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let err = cache.get_or_prepare(&path).unwrap_err();
        assert!(matches!(err, PrepareError::Io { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_template(dir.path(), "a.txt", "{%= a %}");
        let b = write_template(dir.path(), "b.xml", "<x>{%= b %}</x>");
        let cache = cache();

        cache.get_or_prepare(&a).unwrap();
        cache.get_or_prepare(&b).unwrap();
        touch(&b, "<x/>", 60);

        let stats = cache.stats();
        assert_eq!(
            stats,
            CacheStats {
                total_entries: 2,
                stale_entries: 1,
                fresh_entries: 1,
            }
        );
        assert_eq!(stats.to_string(), "CacheStats { total: 2, stale: 1, fresh: 1 }");

        assert_eq!(cache.cleanup_stale(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_template(dir.path(), "a.txt", "x");
        let b = write_template(dir.path(), "b.txt", "y");
        let cache = cache();

        let held = cache.get_or_prepare(&a).unwrap();
        cache.get_or_prepare(&b).unwrap();

        assert!(cache.evict(&a));
        assert!(!cache.evict(&a));
        // Eviction does not release handles still in use
        assert!(held.is_valid());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    #[serial]
    fn test_replaced_handle_removes_scratch_dir_after_last_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "contract.docx", "v1");
        let cache = TemplateCache::new(TemplateFactory::new(ScratchBackend));

        let first = cache.get_or_prepare(&path).unwrap();
        let old_scratch = first.scratch_dir().unwrap().to_path_buf();
        touch(&path, "v2 with changes", 60);
        let second = cache.get_or_prepare(&path).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(second.scratch_dir(), Some(old_scratch.as_path()));
        // Still held by `first`
        assert!(old_scratch.join("content.xml").exists());

        drop(first);
        assert!(!old_scratch.exists());
        assert!(!scratch::is_registered(&old_scratch));

        let current = second.scratch_dir().unwrap().to_path_buf();
        cache.clear();
        assert!(current.exists());
        drop(second);
        assert!(!current.exists());
    }

    #[test]
    fn test_failed_refresh_evicts_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.txt", "{%= name %}");
        let cache = cache();

        cache.get_or_prepare(&path).unwrap();
        touch(&path, "{%if name%}never closed", 60);

        let err = cache.get_or_prepare(&path).unwrap_err();
        assert!(matches!(err, PrepareError::Parsing(_)));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_entries, 0);
    }
}
