//! Streaming helpers: fan-out writes and hash-while-reading.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::warn;

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Forwards every chunk to two sinks before accepting the next one.
pub struct Tee<A, B> {
    first: A,
    second: B,
    written: u64,
}

impl<A, B> Tee<A, B>
where
    A: AsyncWrite + Unpin,
    B: AsyncWrite + Unpin,
{
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            written: 0,
        }
    }

    /// Write `chunk` to both sinks.
    ///
    /// Both sinks see the chunk even if the first fails; the first sink's
    /// error wins when both fail.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let first = self.first.write_all(chunk).await;
        let second = self.second.write_all(chunk).await;

        match (first, second) {
            (Ok(()), Ok(())) => {
                self.written += chunk.len() as u64;
                Ok(())
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(first), Err(second)) => {
                warn!(error = %second, "Second tee sink failed as well");
                Err(first)
            }
        }
    }

    /// Bytes accepted by both sinks.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

/// A write sink that only accumulates a SHA-256 digest.
#[derive(Default)]
pub struct HashSink {
    hasher: Sha256,
}

impl HashSink {
    /// Lowercase hex digest of everything written.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl AsyncWrite for HashSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.hasher.update(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Lowercase hex digest of everything read so far.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let this = &mut *self;
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.hasher.update(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}
