//! `CurlIoHandler`: a [`BufferHelper`] whose producer drives an HTTP
//! client instead of libcurl. The host project is C++ and talks to
//! libcurl directly; this crate already depends on `reqwest` for the
//! same "streamed GET over HTTP" need (used elsewhere for online-service
//! item resolution), so it plays libcurl's role here — noted as the
//! one dependency substitution in DESIGN.md.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::io::buffer::{BufferHelper, BufferHelperConfig, ChunkSource};

/// Pulls chunks from a streamed HTTP GET, re-issuing the request with a
/// `Range: bytes=N-` header whenever the ring's producer loop needs to
/// restart at a new offset (a seek that couldn't be satisfied from the
/// buffered window).
pub struct HttpChunkSource {
    client: reqwest::Client,
    url: String,
    stream: Option<futures_util::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>>,
    pending: bytes::Bytes,
}

impl HttpChunkSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into(), stream: None, pending: bytes::Bytes::new() }
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn open_at(&mut self, offset: u64) -> CdsResult<()> {
        let mut req = self.client.get(&self.url);
        if offset > 0 {
            req = req.header(reqwest::header::RANGE, format!("bytes={offset}-"));
        }
        let resp = req.send().await.map_err(|e| CdsError::SourceUnavailable(e.to_string()))?;
        if !resp.status().is_success() && resp.status().as_u16() != 206 {
            return Err(CdsError::SourceUnavailable(format!("HTTP {} fetching {}", resp.status(), self.url)));
        }
        self.stream = Some(Box::pin(resp.bytes_stream()));
        self.pending = bytes::Bytes::new();
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> CdsResult<usize> {
        if self.pending.is_empty() {
            let stream = self.stream.as_mut().ok_or_else(|| CdsError::InvalidArgument("source not open".into()))?;
            match stream.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(CdsError::SourceUnavailable(e.to_string())),
                None => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending = self.pending.slice(n..);
        Ok(n)
    }
}

pub fn new_handler(client: reqwest::Client, url: impl Into<String>, config: BufferHelperConfig) -> BufferHelper {
    BufferHelper::new(config, Box::new(HttpChunkSource::new(client, url)))
}
