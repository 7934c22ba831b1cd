//! `BufferHelper`: the abstract producer/consumer ring shared by
//! `CurlIoHandler` and `ProcessIoHandler`.
//!
//! One producer task pulls bytes from a [`ChunkSource`] (`reqwest` for
//! the HTTP handler; a transcoder's stdout pipe for the process handler)
//! into a bounded ring; the reader drains it through the `IoHandler`
//! trait. At most one producer, at most one reader. What would be a
//! condition-variable wait on a raw thread becomes `Notify` + `.await`
//! here — the suspension point is the same, just expressed as an async
//! yield instead of a thread block.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::io::{IoHandler, ReadOutcome, SeekWhence};

/// What the producer task pulls bytes from. Implemented by the curl
/// (HTTP) and process (transcoder stdout) handlers; `open_at` is called
/// once at producer start and again any time a seek can't be satisfied
/// from already-buffered data.
#[async_trait]
pub trait ChunkSource: Send {
    async fn open_at(&mut self, offset: u64) -> CdsResult<()>;
    /// Returns `0` on EOF, matching the "read past EOF returns 0" rule.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> CdsResult<usize>;
    /// Whether this source can satisfy an `open_at` at a nonzero offset
    /// at all (some transcoder fifos cannot be seeked).
    fn seekable(&self) -> bool {
        true
    }
}

struct RingState {
    buf: VecDeque<u8>,
    /// Absolute stream offset of `buf`'s front byte.
    window_start: u64,
    eof: bool,
    closed: bool,
    error: Option<String>,
    pending_seek: Option<u64>,
}

pub struct BufferHelperConfig {
    pub capacity: usize,
    pub initial_fill: usize,
    pub read_timeout: Duration,
}

impl Default for BufferHelperConfig {
    fn default() -> Self {
        Self { capacity: 1024 * 1024, initial_fill: 64 * 1024, read_timeout: Duration::from_secs(10) }
    }
}

struct RingShared {
    state: Mutex<RingState>,
    data_notify: Notify,
    space_notify: Notify,
    capacity: usize,
    initial_fill: usize,
}

async fn producer_loop(shared: Arc<RingShared>, mut source: Box<dyn ChunkSource>) {
    {
        let mut state = shared.state.lock().await;
        if let Err(e) = source.open_at(state.window_start).await {
            state.error = Some(e.to_string());
            shared.data_notify.notify_waiters();
            return;
        }
    }

    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let seek_target = {
            let state = shared.state.lock().await;
            if state.closed {
                return;
            }
            state.pending_seek
        };

        if let Some(target) = seek_target {
            if let Err(e) = source.open_at(target).await {
                let mut state = shared.state.lock().await;
                state.error = Some(e.to_string());
                state.pending_seek = None;
                shared.data_notify.notify_waiters();
                return;
            }
            let mut state = shared.state.lock().await;
            state.buf.clear();
            state.window_start = target;
            state.eof = false;
            state.pending_seek = None;
            shared.data_notify.notify_waiters();
            continue;
        }

        // Back off while the ring is full, waking on space or a new seek.
        loop {
            let full = {
                let state = shared.state.lock().await;
                if state.closed {
                    return;
                }
                if state.pending_seek.is_some() {
                    break;
                }
                state.buf.len() >= shared.capacity
            };
            if !full {
                break;
            }
            shared.space_notify.notified().await;
        }

        {
            let state = shared.state.lock().await;
            if state.pending_seek.is_some() {
                continue;
            }
        }

        let n = match source.read_chunk(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                let mut state = shared.state.lock().await;
                state.error = Some(e.to_string());
                shared.data_notify.notify_waiters();
                return;
            }
        };

        let mut state = shared.state.lock().await;
        if state.pending_seek.is_some() {
            continue;
        }
        if n == 0 {
            state.eof = true;
            shared.data_notify.notify_waiters();
            return;
        }
        state.buf.extend(&chunk[..n]);
        shared.data_notify.notify_waiters();
    }
}

/// Reader-side handle. Owns the producer task's `JoinHandle` so `close()`
/// can join it promptly on cancellation.
pub struct BufferHelper {
    shared: Arc<RingShared>,
    producer: Option<JoinHandle<()>>,
    config: BufferHelperConfig,
}

impl BufferHelper {
    pub fn new(config: BufferHelperConfig, source: Box<dyn ChunkSource>) -> Self {
        let shared = Arc::new(RingShared {
            state: Mutex::new(RingState {
                buf: VecDeque::new(),
                window_start: 0,
                eof: false,
                closed: false,
                error: None,
                pending_seek: None,
            }),
            data_notify: Notify::new(),
            space_notify: Notify::new(),
            capacity: config.capacity,
            initial_fill: config.initial_fill,
        });
        let producer = tokio::spawn(producer_loop(shared.clone(), source));
        Self { shared, producer: Some(producer), config }
    }
}

#[async_trait]
impl IoHandler for BufferHelper {
    /// Blocks until `initial_fill` bytes are buffered on open.
    async fn open(&mut self) -> CdsResult<()> {
        loop {
            {
                let state = self.shared.state.lock().await;
                if let Some(err) = &state.error {
                    return Err(CdsError::SourceUnavailable(err.clone()));
                }
                if state.eof || state.buf.len() >= self.shared.initial_fill {
                    return Ok(());
                }
            }
            if tokio::time::timeout(self.config.read_timeout, self.shared.data_notify.notified())
                .await
                .is_err()
            {
                return Err(CdsError::Timeout);
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> CdsResult<ReadOutcome> {
        loop {
            {
                let mut state = self.shared.state.lock().await;
                if let Some(err) = &state.error {
                    return Err(CdsError::SourceUnavailable(err.clone()));
                }
                if !state.buf.is_empty() {
                    let n = state.buf.len().min(buf.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = state.buf.pop_front().unwrap();
                    }
                    state.window_start += n as u64;
                    self.shared.space_notify.notify_waiters();
                    return Ok(ReadOutcome::Bytes(n));
                }
                if state.eof {
                    return Ok(ReadOutcome::Eof);
                }
            }
            if tokio::time::timeout(self.config.read_timeout, self.shared.data_notify.notified())
                .await
                .is_err()
            {
                return Ok(ReadOutcome::CheckSocket);
            }
        }
    }

    /// Forward seeks within already-buffered data are satisfied in place;
    /// anything else asks the producer to restart at the new absolute
    /// offset.
    async fn seek(&mut self, offset: i64, whence: SeekWhence) -> CdsResult<u64> {
        let target = {
            let state = self.shared.state.lock().await;
            let base = match whence {
                SeekWhence::Start => 0i64,
                SeekWhence::Current => state.window_start as i64,
                SeekWhence::End => state.window_start as i64 + state.buf.len() as i64,
            };
            let target = base + offset;
            if target < 0 {
                return Err(CdsError::InvalidArgument(format!("negative seek target {target}")));
            }
            target as u64
        };

        {
            let mut state = self.shared.state.lock().await;
            let window_end = state.window_start + state.buf.len() as u64;
            if target >= state.window_start && target <= window_end {
                let drop = (target - state.window_start) as usize;
                state.buf.drain(..drop);
                state.window_start = target;
                self.shared.space_notify.notify_waiters();
                return Ok(target);
            }
            state.pending_seek = Some(target);
            state.eof = false;
        }
        self.shared.space_notify.notify_waiters();

        loop {
            {
                let state = self.shared.state.lock().await;
                if let Some(err) = &state.error {
                    return Err(CdsError::SourceUnavailable(err.clone()));
                }
                if state.pending_seek.is_none() {
                    return Ok(state.window_start);
                }
            }
            if tokio::time::timeout(self.config.read_timeout, self.shared.data_notify.notified())
                .await
                .is_err()
            {
                return Err(CdsError::Timeout);
            }
        }
    }

    async fn close(&mut self) -> CdsResult<()> {
        {
            let mut state = self.shared.state.lock().await;
            state.closed = true;
        }
        self.shared.space_notify.notify_waiters();
        self.shared.data_notify.notify_waiters();
        if let Some(handle) = self.producer.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        data: Vec<u8>,
        pos: usize,
        reads_after_fill: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChunkSource for FixedSource {
        async fn open_at(&mut self, offset: u64) -> CdsResult<()> {
            self.pos = offset as usize;
            Ok(())
        }

        async fn read_chunk(&mut self, buf: &mut [u8]) -> CdsResult<usize> {
            if self.pos >= self.data.len() {
                return Ok(0);
            }
            let remaining = &self.data[self.pos..];
            let n = remaining.len().min(buf.len()).min(4096);
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            self.reads_after_fill.fetch_add(1, Ordering::SeqCst);
            Ok(n)
        }
    }

    fn make_source(data: Vec<u8>) -> (Box<dyn ChunkSource>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        (Box::new(FixedSource { data, pos: 0, reads_after_fill: counter.clone() }), counter)
    }

    #[tokio::test]
    async fn reads_full_stream_sequentially() {
        let data: Vec<u8> = (0u8..=255).collect();
        let (source, _) = make_source(data.clone());
        let config = BufferHelperConfig { capacity: 64, initial_fill: 16, read_timeout: Duration::from_secs(2) };
        let mut handler = BufferHelper::new(config, source);
        handler.open().await.unwrap();

        let mut collected = Vec::new();
        loop {
            let mut buf = [0u8; 32];
            match handler.read(&mut buf).await.unwrap() {
                ReadOutcome::Bytes(n) => collected.extend_from_slice(&buf[..n]),
                ReadOutcome::Eof => break,
                ReadOutcome::CheckSocket => panic!("unexpected check-socket on an always-ready source"),
            }
        }
        handler.close().await.unwrap();
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn forward_seek_within_buffer_does_not_restart_source() {
        let data: Vec<u8> = (0u8..=255).collect();
        let (source, reads) = make_source(data.clone());
        let config = BufferHelperConfig { capacity: 256, initial_fill: 200, read_timeout: Duration::from_secs(2) };
        let mut handler = BufferHelper::new(config, source);
        handler.open().await.unwrap();
        let reads_after_open = reads.load(Ordering::SeqCst);

        handler.seek(50, SeekWhence::Start).await.unwrap();
        let mut buf = [0u8; 4];
        let n = match handler.read(&mut buf).await.unwrap() {
            ReadOutcome::Bytes(n) => n,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(&buf[..n], &data[50..54]);
        // In-buffer forward seek must not have triggered another fetch.
        assert_eq!(reads.load(Ordering::SeqCst), reads_after_open);
        handler.close().await.unwrap();
    }

    #[tokio::test]
    async fn seek_beyond_buffer_restarts_the_source() {
        let data: Vec<u8> = (0u8..=255).collect();
        let (source, _) = make_source(data.clone());
        let config = BufferHelperConfig { capacity: 32, initial_fill: 16, read_timeout: Duration::from_secs(2) };
        let mut handler = BufferHelper::new(config, source);
        handler.open().await.unwrap();

        handler.seek(200, SeekWhence::Start).await.unwrap();
        let mut buf = [0u8; 4];
        let n = match handler.read(&mut buf).await.unwrap() {
            ReadOutcome::Bytes(n) => n,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(&buf[..n], &data[200..204]);
        handler.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_joins_the_producer_promptly() {
        let (source, _) = make_source(vec![0u8; 4096]);
        let config = BufferHelperConfig { capacity: 256, initial_fill: 16, read_timeout: Duration::from_secs(2) };
        let mut handler = BufferHelper::new(config, source);
        handler.open().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handler.close()).await.unwrap().unwrap();
    }
}
