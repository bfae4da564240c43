//! A content-addressed, on-disk byte store used to back the HTTP cache
//! (§4.3 `[ADDED]`). Keys are hashed with SHA-256 and dispersed over a
//! few levels of nested directories so that a large cache doesn't pile
//! every entry into one directory.

use fs4::FileExt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DIR_NEST_DEPTH: usize = 2;

fn key_to_path(base: &Path, key: &[u8]) -> PathBuf {
    let hash = rattler_digest::compute_bytes_digest::<rattler_digest::Sha256>(key);
    let encoded = data_encoding::BASE64URL_NOPAD.encode(hash.as_slice());
    let mut path = base.to_path_buf();
    for i in 0..DIR_NEST_DEPTH {
        path.push(&encoded[i..i + 1]);
    }
    path.push(&encoded[DIR_NEST_DEPTH..]);
    path
}

/// A directory of content-addressed blobs, each guarded by an advisory
/// file lock for the duration of a read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: &Path) -> io::Result<Self> {
        fs::create_dir_all(base)?;
        Ok(Self {
            base: base.canonicalize()?,
        })
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let path = key_to_path(&self.base, key);
        fs::read(path).ok()
    }

    /// Writes `bytes` under `key`, replacing any previous entry. Uses a
    /// write-to-temp-then-rename so concurrent readers never observe a
    /// partially written file.
    pub fn set(&self, key: &[u8], bytes: &[u8]) -> io::Result<()> {
        let path = key_to_path(&self.base, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(path.parent().unwrap())?;
        {
            use std::io::Write;
            let lock_file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .open(path.with_extension("lock"))?;
            lock_file.lock_exclusive()?;
            tmp.write_all(bytes)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            FileExt::unlock(&lock_file)?;
        }
        Ok(())
    }

    pub fn remove(&self, key: &[u8]) -> io::Result<()> {
        let path = key_to_path(&self.base, key);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get(b"key").is_none());
        store.set(b"key", b"value").unwrap();
        assert_eq!(store.get(b"key").unwrap(), b"value");
        store.remove(b"key").unwrap();
        assert!(store.get(b"key").is_none());
    }
}
