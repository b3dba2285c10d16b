//! Archive file replay source

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, trace};

use crate::source::Source;
use crate::types::RawFragment;
use crate::{Result, TimingError};

/// Replays a capture written by [`ArchivingSource`](super::ArchivingSource).
///
/// The file is a sequence of three-line records: category name, payload,
/// fragment timestamp. Fragments are read as fast as the pipeline accepts
/// them; pacing is left to the scheduler.
#[derive(Debug)]
pub struct ArchiveSource {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    records: u64,
    /// Set once the end of the file (or a cut-off record) is reached
    exhausted: bool,
}

impl ArchiveSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lines: None, records: 0, exhausted: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    fn close(&mut self) {
        self.lines = None;
        self.exhausted = true;
    }

    fn truncated(&self, missing: &str) -> TimingError {
        let details = format!("record {} ends before its {missing} line", self.records + 1);
        TimingError::file_error(&self.path, io::Error::new(io::ErrorKind::UnexpectedEof, details))
    }
}

#[async_trait::async_trait]
impl Source for ArchiveSource {
    async fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.path).await.map_err(|e| TimingError::file_error(&self.path, e))?;
        self.lines = Some(BufReader::new(file).lines());
        self.exhausted = false;
        info!(path = %self.path.display(), "Opened timing archive");
        Ok(())
    }

    async fn next_fragment(&mut self) -> Result<Option<RawFragment>> {
        if self.exhausted {
            return Ok(None);
        }
        let path = self.path.clone();
        let Some(lines) = self.lines.as_mut() else {
            return Err(TimingError::connection_failed(format!("archive {} is not open", path.display())));
        };
        let read_error = |e| TimingError::file_error(&path, e);

        // Blank lines between records are tolerated
        let name = loop {
            match lines.next_line().await.map_err(read_error)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
                None => {
                    debug!(records = self.records, "Reached end of archive");
                    self.close();
                    return Ok(None);
                }
            }
        };
        let Some(payload) = lines.next_line().await.map_err(read_error)? else {
            self.close();
            return Err(self.truncated("payload"));
        };
        let Some(timestamp) = lines.next_line().await.map_err(read_error)? else {
            self.close();
            return Err(self.truncated("timestamp"));
        };

        self.records += 1;
        trace!(record = self.records, category = %name, "Read archive record");
        Ok(Some(RawFragment::from_wire(name.trim(), payload.into_bytes(), timestamp.trim())))
    }
}
