//! The streaming / IO-handler layer (component G): bounded-buffer
//! producer/consumer handlers for local files, HTTP-fetched URLs, and
//! external transcoder processes.
//!
//! Realized with `tokio` tasks rather than raw OS threads:
//! `BufferHelper`'s ring buffer blocks on an `Arc<Notify>` instead of a
//! raw condition variable, and `.await` suspension replaces a blocking
//! thread wait.

pub mod buffer;
pub mod curl;
pub mod file;
pub mod mem;
pub mod process;

use async_trait::async_trait;

use crate::cds::error::CdsResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Start,
    Current,
    End,
}

/// Outcome of a `read()` call distinguishing real progress from two
/// sentinels: end of stream, and "check the client socket" (a read
/// timeout that isn't a hard error — the host HTTP layer should poll
/// for a client disconnect and retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Bytes(usize),
    Eof,
    CheckSocket,
}

/// The polymorphic IO handler contract. Every concrete handler honours
/// prompt cancellation: `close()` must return once any producer task it
/// owns has been signalled and joined.
#[async_trait]
pub trait IoHandler: Send + Sync {
    async fn open(&mut self) -> CdsResult<()>;
    async fn read(&mut self, buf: &mut [u8]) -> CdsResult<ReadOutcome>;
    async fn seek(&mut self, offset: i64, whence: SeekWhence) -> CdsResult<u64>;
    async fn close(&mut self) -> CdsResult<()>;
}
