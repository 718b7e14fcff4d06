//! Scripted stand-ins for the wizard's streams.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Yields the given chunks one read at a time, then end of stream.
pub struct ScriptedReader {
    chunks: VecDeque<Vec<u8>>,
}

impl ScriptedReader {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
        }
    }

    pub fn from_strs(chunks: &[&str]) -> Self {
        Self::new(chunks.iter().map(|c| c.as_bytes().to_vec()))
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(mut chunk) = self.chunks.pop_front() {
            let n = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.chunks.push_front(chunk);
            }
        }
        Poll::Ready(Ok(()))
    }
}

/// Records every write and flush so tests can assert on the exact wire
/// traffic, including how writes were grouped between flushes.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Default)]
struct Recorded {
    pending: Vec<u8>,
    flushed: Vec<String>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data grouped by the flush that pushed it out.
    pub fn flushed(&self) -> Vec<String> {
        self.inner.lock().unwrap().flushed.clone()
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.lock().unwrap().pending.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut rec = self.inner.lock().unwrap();
        if !rec.pending.is_empty() {
            let data = std::mem::take(&mut rec.pending);
            rec.flushed.push(String::from_utf8_lossy(&data).into_owned());
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}

/// A writer whose pipe is already closed.
pub struct BrokenWriter;

impl AsyncWrite for BrokenWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
