//! Output sinks.
//!
//! A [`Sink`] receives markup fragments in document order. A write may
//! suspend (e.g. while a socket drains); the renderer does not produce the
//! next fragment until the previous write has completed.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::RenderError;

#[async_trait]
pub trait Sink: Send {
    async fn write(&mut self, chunk: String) -> Result<(), RenderError>;

    /// Called once after the last fragment.
    async fn finish(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StringSink
// ---------------------------------------------------------------------------

/// Accumulates the whole document in memory.
#[derive(Debug, Clone, Default)]
pub struct StringSink {
    buf: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

#[async_trait]
impl Sink for StringSink {
    async fn write(&mut self, chunk: String) -> Result<(), RenderError> {
        self.buf.push_str(&chunk);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// Forwards each fragment over a bounded channel. A full channel applies
/// backpressure to the render.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<String, RenderError>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Result<String, RenderError>>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Result<String, RenderError>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Report a render failure to the consumer.
    pub async fn fail(&self, err: RenderError) {
        let _ = self.tx.send(Err(err)).await;
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn write(&mut self, chunk: String) -> Result<(), RenderError> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| RenderError::Sink("stream receiver dropped".into()))
    }
}

// ---------------------------------------------------------------------------
// WriterSink
// ---------------------------------------------------------------------------

/// Writes fragments to any tokio writer (stdout, a socket, a file).
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
    async fn write(&mut self, chunk: String) -> Result<(), RenderError> {
        self.writer.write_all(chunk.as_bytes()).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RenderError> {
        self.writer.flush().await?;
        Ok(())
    }
}
