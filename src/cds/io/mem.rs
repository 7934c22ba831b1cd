//! `MemIoHandler`: an in-memory bounded-cursor buffer, used for small
//! synthesized resources (e.g. a generated thumbnail) where a real
//! file or network round-trip would be overkill.

use async_trait::async_trait;

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::io::{IoHandler, ReadOutcome, SeekWhence};

pub struct MemIoHandler {
    data: Vec<u8>,
    cursor: usize,
}

impl MemIoHandler {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }
}

#[async_trait]
impl IoHandler for MemIoHandler {
    async fn open(&mut self) -> CdsResult<()> {
        self.cursor = 0;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> CdsResult<ReadOutcome> {
        if self.cursor >= self.data.len() {
            return Ok(ReadOutcome::Eof);
        }
        let remaining = &self.data[self.cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(ReadOutcome::Bytes(n))
    }

    async fn seek(&mut self, offset: i64, whence: SeekWhence) -> CdsResult<u64> {
        let base = match whence {
            SeekWhence::Start => 0i64,
            SeekWhence::Current => self.cursor as i64,
            SeekWhence::End => self.data.len() as i64,
        };
        let target = base + offset;
        if target < 0 || target as usize > self.data.len() {
            return Err(CdsError::InvalidArgument(format!("seek out of range: {target}")));
        }
        self.cursor = target as usize;
        Ok(self.cursor as u64)
    }

    async fn close(&mut self) -> CdsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_to_eof() {
        let mut handler = MemIoHandler::new(b"hello".to_vec());
        handler.open().await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(handler.read(&mut buf).await.unwrap(), ReadOutcome::Bytes(5));
        assert_eq!(handler.read(&mut buf).await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn rejects_out_of_range_seek() {
        let mut handler = MemIoHandler::new(b"hello".to_vec());
        handler.open().await.unwrap();
        assert!(handler.seek(100, SeekWhence::Start).await.is_err());
    }

    #[tokio::test]
    async fn seek_from_end_reads_tail() {
        let mut handler = MemIoHandler::new(b"0123456789".to_vec());
        handler.open().await.unwrap();
        handler.seek(-3, SeekWhence::End).await.unwrap();
        let mut buf = [0u8; 8];
        let n = match handler.read(&mut buf).await.unwrap() {
            ReadOutcome::Bytes(n) => n,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(&buf[..n], b"789");
    }
}
