//! Segment writer backed by a local file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::application::ports::{SegmentWriter, WriterError, WriterFactory};
use crate::domain::recording::{MediaSample, MediaTimestamp};

/// Creates one [`FileSegmentWriter`] per segment path
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriterFactory;

impl FileWriterFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WriterFactory for FileWriterFactory {
    async fn create(&self, path: &Path) -> Result<Box<dyn SegmentWriter>, WriterError> {
        // Truncates any file left over from an earlier session on this channel
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| WriterError::CreateFailed(format!("{}: {}", path.display(), e)))?;

        Ok(Box::new(FileSegmentWriter::new(path.to_path_buf(), file)))
    }
}

/// Streams sample bytes into a segment file
pub struct FileSegmentWriter {
    path: PathBuf,
    out: BufWriter<File>,
    started: Option<MediaTimestamp>,
    ended: Option<MediaTimestamp>,
    finished: bool,
    bytes: u64,
}

impl FileSegmentWriter {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            out: BufWriter::new(file),
            started: None,
            ended: None,
            finished: false,
            bytes: 0,
        }
    }
}

#[async_trait]
impl SegmentWriter for FileSegmentWriter {
    fn start_session(&mut self, at: MediaTimestamp) -> Result<(), WriterError> {
        if self.finished {
            return Err(WriterError::InputFinished);
        }
        self.started = Some(at);
        Ok(())
    }

    async fn append(&mut self, sample: &MediaSample) -> Result<(), WriterError> {
        if self.started.is_none() {
            return Err(WriterError::SessionNotStarted);
        }
        if self.finished {
            return Err(WriterError::InputFinished);
        }
        self.out
            .write_all(&sample.data)
            .await
            .map_err(|e| WriterError::AppendFailed(e.to_string()))?;
        self.bytes += sample.data.len() as u64;
        Ok(())
    }

    fn end_session(&mut self, at: MediaTimestamp) {
        self.ended = Some(at);
    }

    fn mark_as_finished(&mut self) {
        self.finished = true;
    }

    async fn finish_writing(mut self: Box<Self>) -> Result<(), WriterError> {
        self.out
            .flush()
            .await
            .map_err(|e| WriterError::FinishFailed(e.to_string()))?;
        self.out
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| WriterError::FinishFailed(e.to_string()))?;

        debug!(
            path = %self.path.display(),
            bytes = self.bytes,
            start = ?self.started,
            end = ?self.ended,
            "segment file written"
        );
        Ok(())
    }
}
