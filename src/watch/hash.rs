// src/watch/hash.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last known content hash of every watched source unit.
///
/// Editors tend to emit several events per save; comparing content hashes
/// collapses those into a single change and ignores touches that do not
/// change content.
#[derive(Debug, Default)]
pub struct SourceHashes {
    hashes: HashMap<PathBuf, String>,
}

impl SourceHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of each existing file.
    pub fn seed<I, P>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                let hash = compute_file_hash(path)?;
                self.hashes.insert(path.to_path_buf(), hash);
            }
        }
        Ok(())
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.hashes.contains_key(path)
    }

    /// Re-hash `path` and report whether its content differs from the last
    /// recorded hash. A tracked file that disappeared counts as changed once.
    pub fn changed(&mut self, path: &Path) -> Result<bool> {
        if !path.is_file() {
            return Ok(self.hashes.remove(path).is_some());
        }

        let hash = compute_file_hash(path)?;
        let previous = self.hashes.insert(path.to_path_buf(), hash.clone());
        let changed = previous.as_deref() != Some(hash.as_str());
        debug!(?path, hash = %hash, changed, "rehashed source unit");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn unchanged_content_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let unit = dir.path().join("app.sh");
        fs::write(&unit, "app_run() { :; }\n").unwrap();

        let mut hashes = SourceHashes::new();
        hashes.seed([&unit]).unwrap();

        fs::write(&unit, "app_run() { :; }\n").unwrap();
        assert!(!hashes.changed(&unit).unwrap());

        fs::write(&unit, "app_run() { echo hi; }\n").unwrap();
        assert!(hashes.changed(&unit).unwrap());
        assert!(!hashes.changed(&unit).unwrap());
    }

    #[test]
    fn removed_file_counts_once() {
        let dir = tempfile::tempdir().unwrap();
        let unit = dir.path().join("lib.sh");
        fs::write(&unit, "lib_prepare() { :; }\n").unwrap();

        let mut hashes = SourceHashes::new();
        hashes.seed([&unit]).unwrap();
        fs::remove_file(&unit).unwrap();

        assert!(hashes.changed(&unit).unwrap());
        assert!(!hashes.changed(&unit).unwrap());
        assert!(!hashes.is_tracked(&unit));
    }
}
