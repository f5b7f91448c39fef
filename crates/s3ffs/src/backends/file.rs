//! 📂 File object store: the bucket is a directory, the key is a path inside it.
//!
//! Great for running the whole pipeline against a local file without an S3 account,
//! a MinIO container, or a credit card.

use std::io::SeekFrom;
use std::ops::Range;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

use crate::backends::{ChunkReader, ObjectStore};
use crate::pipeline::chunks::ObjectLocation;

/// 📂 Serves byte ranges of `<root>/<bucket>/<key>`.
#[derive(Debug, Clone, Default)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, location: &ObjectLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.key)
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn head(&mut self, location: &ObjectLocation) -> Result<u64> {
        let path = self.path_of(location);
        let metadata = tokio::fs::metadata(&path).await.context(format!(
            "💀 The door to '{}' would not budge. We knocked. We checked if it existed (it might not).",
            path.display()
        ))?;
        Ok(metadata.len())
    }

    async fn get_range(&mut self, location: &ObjectLocation, range: Range<u64>) -> Result<ChunkReader> {
        let path = self.path_of(location);
        let mut file = File::open(&path)
            .await
            .context(format!("💀 Could not open '{}' for a ranged read", path.display()))?;
        file.seek(SeekFrom::Start(range.start))
            .await
            .context(format!("💀 Could not seek '{}' to byte {}", path.display(), range.start))?;
        trace!("📂 serving {}..{} of '{}'", range.start, range.end, path.display());
        // 🔧 `take` clamps for us: past EOF it just stops early
        Ok(Box::new(file.take(range.end.saturating_sub(range.start))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_a_directory_pretends_to_be_a_bucket() {
        let the_root = tempfile::tempdir().expect("💀 temp dir");
        std::fs::create_dir_all(the_root.path().join("newbucket")).expect("💀 mkdir");
        std::fs::write(the_root.path().join("newbucket/t1.txt"), "hello\nworld\n").expect("💀 write");

        let mut store = FileObjectStore::new(the_root.path());
        let location = ObjectLocation::new("newbucket", "t1.txt");
        assert_eq!(store.head(&location).await.expect("💀 file exists"), 12);

        let mut middle = String::new();
        store
            .get_range(&location, 3..8)
            .await
            .expect("💀 range opens")
            .read_to_string(&mut middle)
            .await
            .expect("💀 range reads");
        assert_eq!(middle, "lo\nwo");

        let mut tail = String::new();
        store
            .get_range(&location, 10..64)
            .await
            .expect("💀 range opens")
            .read_to_string(&mut tail)
            .await
            .expect("💀 range reads");
        assert_eq!(tail, "d\n");
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_is_a_head_failure() {
        let the_root = tempfile::tempdir().expect("💀 temp dir");
        let mut store = FileObjectStore::new(the_root.path());
        assert!(store.head(&ObjectLocation::new("nope", "nothing.txt")).await.is_err());
    }
}
