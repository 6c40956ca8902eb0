//! Byte-trimming of per-block tool output.
//!
//! Every block is produced by a fresh tool invocation, so its raw output
//! starts with the container header and ends with the end-of-file marker.
//! Body blocks drop the leading header bytes; every block but the last drops
//! the trailing marker, so that header + bodies concatenated in block order
//! form exactly one valid file.
//!
//! The last `trailer.len()` bytes seen are always held back in a window, which
//! keeps a marker split across two reads intact until the stream ends.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read size used when copying tool output to the client.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// How much to cut from the front and back of one block's raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimSpec {
    pub head_bytes_to_drop: u64,
    /// End-of-file marker of the container format.
    pub trailer: &'static [u8],
    /// Only the logically last block keeps its marker.
    pub keep_trailer: bool,
}

impl TrimSpec {
    pub fn new(head_bytes_to_drop: u64, trailer: &'static [u8], keep_trailer: bool) -> Self {
        Self {
            head_bytes_to_drop,
            trailer,
            keep_trailer,
        }
    }

    pub fn tail_bytes_to_drop(&self) -> usize {
        if self.keep_trailer { 0 } else { self.trailer.len() }
    }
}

/// Incremental trimmer: feed chunks with [`Trimmer::push`], then call [`Trimmer::finish`].
#[derive(Debug)]
pub struct Trimmer {
    spec: TrimSpec,
    head_remaining: u64,
    window: BytesMut,
}

impl Trimmer {
    pub fn new(spec: TrimSpec) -> Self {
        Self {
            spec,
            head_remaining: spec.head_bytes_to_drop,
            window: BytesMut::with_capacity(COPY_CHUNK_SIZE + spec.trailer.len()),
        }
    }

    /// Accept the next chunk of raw output and return the bytes now safe to emit.
    pub fn push(&mut self, mut chunk: &[u8]) -> Bytes {
        if self.head_remaining > 0 {
            let skip = self.head_remaining.min(chunk.len() as u64) as usize;
            chunk = &chunk[skip..];
            self.head_remaining -= skip as u64;
        }

        self.window.extend_from_slice(chunk);

        let hold = self.spec.trailer.len();
        if self.window.len() > hold {
            let ready = self.window.len() - hold;
            self.window.split_to(ready).freeze()
        } else {
            Bytes::new()
        }
    }

    /// Resolve the held-back window once the raw stream has ended.
    pub fn finish(mut self) -> Result<Bytes> {
        if self.head_remaining > 0 {
            return Err(Error::Internal(format!(
                "stream ended {} bytes before the end of the header",
                self.head_remaining
            )));
        }

        let trailer = self.spec.trailer;
        let has_trailer = self.window[..] == *trailer;

        if !self.spec.keep_trailer {
            return if has_trailer {
                Ok(Bytes::new())
            } else {
                Err(Error::Internal(
                    "block did not end with the end-of-file marker".to_string(),
                ))
            };
        }

        if !has_trailer {
            tracing::warn!("last block is missing its end-of-file marker, appending it");
            self.window.extend_from_slice(trailer);
        }
        Ok(self.window.freeze())
    }
}

struct TrimState<R, F> {
    reader: R,
    trimmer: Option<Trimmer>,
    on_eof: Option<F>,
    buf: Vec<u8>,
}

async fn next_chunk<R, F>(mut state: TrimState<R, F>) -> Result<Option<(Bytes, TrimState<R, F>)>>
where
    R: AsyncRead + Unpin,
    F: Future<Output = Result<()>>,
{
    while let Some(trimmer) = state.trimmer.as_mut() {
        let n = state.reader.read(&mut state.buf).await?;
        if n > 0 {
            let ready = trimmer.push(&state.buf[..n]);
            if !ready.is_empty() {
                return Ok(Some((ready, state)));
            }
            continue;
        }

        // Producer must have exited cleanly before the marker is released.
        if let Some(on_eof) = state.on_eof.take() {
            on_eof.await?;
        }

        let Some(trimmer) = state.trimmer.take() else {
            break;
        };
        let tail = trimmer.finish()?;
        if !tail.is_empty() {
            return Ok(Some((tail, state)));
        }
    }
    Ok(None)
}

/// Stream `reader` through a [`Trimmer`] in [`COPY_CHUNK_SIZE`] reads.
///
/// `on_eof` runs once the reader is exhausted and before the held-back bytes
/// are released; an error from it (a pipeline stage failed) ends the stream
/// with that error instead of a well-formed tail.
pub fn trimmed_stream<R, F>(reader: R, spec: TrimSpec, on_eof: F) -> impl Stream<Item = Result<Bytes>>
where
    R: AsyncRead + Unpin,
    F: Future<Output = Result<()>>,
{
    let state = TrimState {
        reader,
        trimmer: Some(Trimmer::new(spec)),
        on_eof: Some(on_eof),
        buf: vec![0; COPY_CHUNK_SIZE],
    };
    stream::try_unfold(state, next_chunk)
}

/// Copy `reader` to `writer`, trimmed per `spec`. Returns the number of bytes written.
pub async fn copy_trimmed<R, W>(reader: R, spec: TrimSpec, writer: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    let mut chunks = Box::pin(trimmed_stream(reader, spec, async { Ok::<(), Error>(()) }));
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}
