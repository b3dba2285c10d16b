//! Dual write+read capture source

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::source::{Source, SourceControl};
use crate::types::{Category, RawFragment};
use crate::{Result, TimingError};

/// Wraps any source and appends every fragment it yields to an archive file.
///
/// The archive uses the record format [`ArchiveSource`](super::ArchiveSource)
/// reads back, so a live session captured this way can be replayed later.
pub struct ArchivingSource<S> {
    inner: S,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl<S: Source> ArchivingSource<S> {
    pub fn new<P: AsRef<Path>>(inner: S, path: P) -> Self {
        Self { inner, path: path.as_ref().to_path_buf(), writer: None, written: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&mut self, fragment: &RawFragment) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        // One record is exactly three lines; JSON tolerates the substitution
        let payload: Vec<u8> =
            fragment.payload.iter().map(|&b| if b == b'\n' || b == b'\r' { b' ' } else { b }).collect();

        let mut record = Vec::with_capacity(payload.len() + fragment.timestamp.len() + 32);
        record.extend_from_slice(fragment.category.wire_name().as_bytes());
        record.push(b'\n');
        record.extend_from_slice(&payload);
        record.push(b'\n');
        record.extend_from_slice(fragment.timestamp.as_bytes());
        record.push(b'\n');

        let path = &self.path;
        writer.write_all(&record).await.map_err(|e| TimingError::file_error(path, e))?;
        writer.flush().await.map_err(|e| TimingError::file_error(path, e))?;
        self.written += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Source> Source for ArchivingSource<S> {
    async fn connect(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| TimingError::file_error(parent, e))?;
        }
        let file = File::create(&self.path).await.map_err(|e| TimingError::file_error(&self.path, e))?;
        self.writer = Some(BufWriter::new(file));
        info!(path = %self.path.display(), "Archiving feed");

        self.inner.connect().await
    }

    async fn next_fragment(&mut self) -> Result<Option<RawFragment>> {
        let Some(fragment) = self.inner.next_fragment().await? else {
            debug!(records = self.written, path = %self.path.display(), "Archive complete");
            self.writer = None;
            return Ok(None);
        };

        // The original name of an unknown category is not kept, so it cannot be archived
        if fragment.category != Category::Unknown {
            self.append(&fragment).await?;
        }
        Ok(Some(fragment))
    }

    fn control(&self) -> Option<Arc<dyn SourceControl>> {
        self.inner.control()
    }
}
