//! `FileIoHandler`: a thin async wrapper over a local file, with native
//! seek — the simplest `IoHandler` and the one the Transcode Dispatcher
//! falls back to when conversion is disabled or forbidden (component H).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::io::{IoHandler, ReadOutcome, SeekWhence};

pub struct FileIoHandler {
    path: PathBuf,
    file: Option<File>,
}

impl FileIoHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None }
    }
}

#[async_trait]
impl IoHandler for FileIoHandler {
    async fn open(&mut self) -> CdsResult<()> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| CdsError::SourceUnavailable(format!("{}: {e}", self.path.display())))?;
        self.file = Some(file);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> CdsResult<ReadOutcome> {
        let file = self.file.as_mut().ok_or_else(|| CdsError::InvalidArgument("handler not open".into()))?;
        let n = file.read(buf).await.map_err(|e| CdsError::SourceUnavailable(e.to_string()))?;
        Ok(if n == 0 { ReadOutcome::Eof } else { ReadOutcome::Bytes(n) })
    }

    async fn seek(&mut self, offset: i64, whence: SeekWhence) -> CdsResult<u64> {
        let file = self.file.as_mut().ok_or_else(|| CdsError::InvalidArgument("handler not open".into()))?;
        let from = match whence {
            SeekWhence::Start => std::io::SeekFrom::Start(offset.max(0) as u64),
            SeekWhence::Current => std::io::SeekFrom::Current(offset),
            SeekWhence::End => std::io::SeekFrom::End(offset),
        };
        file.seek(from).await.map_err(|e| CdsError::SourceUnavailable(e.to_string()))
    }

    async fn close(&mut self) -> CdsResult<()> {
        self.file = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_and_seeks_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(b"0123456789").unwrap();
        }

        let mut handler = FileIoHandler::new(&path);
        handler.open().await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(handler.read(&mut buf).await.unwrap(), ReadOutcome::Bytes(4));
        assert_eq!(&buf, b"0123");

        handler.seek(8, SeekWhence::Start).await.unwrap();
        let mut tail = [0u8; 4];
        let n = match handler.read(&mut tail).await.unwrap() {
            ReadOutcome::Bytes(n) => n,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(&tail[..n], b"89");
    }

    #[tokio::test]
    async fn missing_file_yields_source_unavailable() {
        let mut handler = FileIoHandler::new("/nonexistent/path/does/not/exist.mp3");
        assert!(matches!(handler.open().await, Err(CdsError::SourceUnavailable(_))));
    }
}
