use super::{RangeSource, clip_range};
use crate::error::Result;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A container on the local filesystem.
///
/// Every fetch opens its own handle so concurrent batches never contend on a
/// shared cursor.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = tokio::fs::metadata(&path).await?.len();
        log::debug!("opened {} ({} bytes)", path.display(), size);
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeSource for FileSource {
    async fn fetch_range(&self, offset: u64, length: usize) -> Result<Bytes> {
        let range = clip_range(offset, length, self.size)?;
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(range.len());
        file.take(range.len() as u64).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}
