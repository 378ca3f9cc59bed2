//! `Content-Length` framing for the server's stdio transport.
//!
//! Every message is `Content-Length: N\r\n\r\n` followed by N bytes of JSON.
//! [`FrameReader`] and [`FrameWriter`] wrap the child's stdout and stdin.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Largest frame body accepted from the server (4 MiB).
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the stream ended cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Value>> {
        let Some(len) = self.read_content_length().await? else {
            return Ok(None);
        };

        if len > self.max_frame_bytes {
            bail!("frame of {len} bytes exceeds limit of {}", self.max_frame_bytes);
        }

        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;

        serde_json::from_slice(&body)
            .map(Some)
            .context("frame body is not valid JSON")
    }

    async fn read_content_length(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if n == 0 {
                // EOF is only clean before the first header byte.
                if started {
                    bail!("stream ended inside frame headers");
                }
                return Ok(None);
            }
            started = true;

            let header = line.trim();
            if header.is_empty() {
                break;
            }

            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case(CONTENT_LENGTH)
            {
                let len = value
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid Content-Length {:?}", value.trim()))?;
                content_length = Some(len);
            }
        }

        content_length
            .map(Some)
            .context("frame headers lack Content-Length")
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `msg` and write it as one frame, then flush.
    pub async fn write_frame<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<()> {
        let body = serde_json::to_vec(msg).context("serializing frame body")?;
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(&body)
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")
    }
}
