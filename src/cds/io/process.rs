//! `ProcessIoHandler`: reads a spawned transcoder's stdout through the
//! same [`BufferHelper`] ring used by the curl handler. Death of the
//! child process surfaces as `SourceUnavailable` on the next read rather
//! than panicking the producer task.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::warn;

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::io::buffer::{BufferHelper, BufferHelperConfig, ChunkSource};

/// Spawns the transcoder once at construction; `open_at` with a nonzero
/// offset is refused for fifo/pipe sources that cannot be seeked — an
/// "ignore seek on fifo" flag for clients that probe unseekable streams,
/// since only `offset == 0` (the process's own start) is valid.
pub struct ProcessChunkSource {
    command: Option<Command>,
    child: Option<Child>,
    ignore_seek: bool,
    died: Arc<AtomicBool>,
}

impl ProcessChunkSource {
    pub fn new(agent: &str, args: &[String]) -> Self {
        let mut command = Command::new(agent);
        command.args(args).stdout(Stdio::piped()).stdin(Stdio::null()).stderr(Stdio::null());
        Self { command: Some(command), child: None, ignore_seek: true, died: Arc::new(AtomicBool::new(false)) }
    }

    /// Spawns a companion process whose death should also cancel this
    /// handler's chain — an "abort on death" association for processes
    /// that must live and die together. The watcher task just flips
    /// `died` so the next `read_chunk` surfaces `SourceUnavailable`.
    pub fn watch_associated_death(&self, mut child: Child) {
        let died = self.died.clone();
        tokio::spawn(async move {
            let _ = child.wait().await;
            died.store(true, Ordering::SeqCst);
        });
    }
}

#[async_trait]
impl ChunkSource for ProcessChunkSource {
    fn seekable(&self) -> bool {
        !self.ignore_seek
    }

    async fn open_at(&mut self, offset: u64) -> CdsResult<()> {
        if self.child.is_some() {
            if offset == 0 || !self.ignore_seek {
                return Ok(());
            }
            return Err(CdsError::InvalidArgument("transcoder output is not seekable".into()));
        }
        let mut command =
            self.command.take().ok_or_else(|| CdsError::InvalidArgument("transcoder already spawned".into()))?;
        let child = command.spawn().map_err(|e| CdsError::SourceUnavailable(format!("spawn failed: {e}")))?;
        self.child = Some(child);
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> CdsResult<usize> {
        if self.died.load(Ordering::SeqCst) {
            return Err(CdsError::SourceUnavailable("associated transcoder process exited".into()));
        }
        let child = self.child.as_mut().ok_or_else(|| CdsError::InvalidArgument("source not open".into()))?;
        let stdout = child.stdout.as_mut().ok_or_else(|| CdsError::SourceUnavailable("no stdout pipe".into()))?;
        match stdout.read(buf).await {
            Ok(n) => Ok(n),
            Err(e) => Err(CdsError::SourceUnavailable(e.to_string())),
        }
    }
}

impl Drop for ProcessChunkSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill transcoder process on handler drop");
            }
        }
    }
}

pub fn new_handler(agent: &str, args: &[String], config: BufferHelperConfig) -> BufferHelper {
    BufferHelper::new(config, Box::new(ProcessChunkSource::new(agent, args)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::io::{IoHandler, ReadOutcome};
    use std::time::Duration;

    #[tokio::test]
    async fn streams_stdout_of_a_spawned_process() {
        let config = BufferHelperConfig {
            capacity: 4096,
            initial_fill: 1,
            read_timeout: Duration::from_secs(5),
        };
        let mut handler = new_handler("printf", &["hello-transcode".to_string()], config);
        handler.open().await.unwrap();

        let mut collected = Vec::new();
        loop {
            let mut buf = [0u8; 64];
            match handler.read(&mut buf).await.unwrap() {
                ReadOutcome::Bytes(n) => collected.extend_from_slice(&buf[..n]),
                ReadOutcome::Eof => break,
                ReadOutcome::CheckSocket => break,
            }
        }
        handler.close().await.unwrap();
        assert_eq!(collected, b"hello-transcode");
    }
}
