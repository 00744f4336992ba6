use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::debug;

/// On-disk page cache: one file per URL under a configurable directory.
///
/// The key is derived from the URL verbatim (path-unsafe characters replaced,
/// not hashed), so two URLs differing only by a trailing slash or query order
/// are distinct entries. Entries never expire; `prune` is the only way space
/// is reclaimed.
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Cached body for `url`, or None on a miss. No side effects.
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.entry_path(url);
        match fs::read_to_string(&path) {
            Ok(body) => {
                debug!("Cache hit: {}", url);
                Some(body)
            }
            Err(_) => None,
        }
    }

    /// Store `body` for `url`. Callers only write after a miss, so the
    /// effective policy is fetch-once-then-immutable.
    pub fn put(&self, url: &str, body: &str) -> Result<()> {
        let path = self.entry_path(url);
        fs::write(&path, body)
            .with_context(|| format!("Failed to write cache entry {}", path.display()))?;
        Ok(())
    }

    /// Delete the oldest entries until at most `keep` remain. Returns the
    /// number of files removed.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let mtime = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((mtime, entry.path()));
        }
        if entries.len() <= keep {
            return Ok(0);
        }
        entries.sort_by_key(|(mtime, _)| *mtime);
        let excess = entries.len() - keep;
        let mut removed = 0;
        for (_, path) in entries.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn entry_count(&self) -> Result<usize> {
        let count = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .count();
        Ok(count)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.html", encode_key(url)))
    }
}

/// Flatten a URL into a filename: every character that is not alphanumeric,
/// '-', '.' or '_' becomes '_'. Distinct URLs can in principle collide at the
/// same key; in practice the catalog's URL space does not.
fn encode_key(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── Tests ──
