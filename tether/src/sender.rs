//! The send duty: serializes user commands onto the stream.

use std::ffi::OsStr;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};

use tether_proto::Checksum;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::{Error, Result};

/// Summary of a file that was sent.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SentFile {
    /// Name announced to the peer.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// MD5 of the payload.
    pub checksum: Checksum,
    /// Time spent writing header and payload.
    pub elapsed: Duration,
}

/// Sole writer of a connection.
#[derive(Debug)]
pub struct Sender<W> {
    writer: W,
    chunk_size: usize,
}

impl<W: AsyncWrite + Unpin> Sender<W> {
    /// Wraps the write half of a connection.
    pub fn new(writer: W, chunk_size: usize) -> Self {
        Self {
            writer,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Sends one text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        let frame = tether_proto::encode_text(text)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        debug!(bytes = text.len(), "text sent");
        Ok(())
    }

    /// Sends the file at `path` as one file frame.
    ///
    /// The digest is computed in a first pass over the file, then the header
    /// and payload are written. The announced name is the last component of
    /// `path` and must fit in 255 bytes; nothing is written if it does not.
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<SentFile> {
        let path = path.as_ref();
        let name = path.file_name().and_then(OsStr::to_str).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: not a usable file name", path.display()),
            )
        })?;
        tether_proto::check_name(name)?;

        let mut file = File::open(path).await?;
        if !file.metadata().await?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: not a regular file", path.display()),
            )
            .into());
        }
        let (checksum, size) = tether_proto::checksum_reader(&mut file, self.chunk_size).await?;
        file.seek(SeekFrom::Start(0)).await?;

        let header = tether_proto::encode_file_header(name, size, &checksum)?;
        info!(name, size, %checksum, "sending file");
        let started = Instant::now();
        self.writer.write_all(&header).await?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut sent = 0u64;
        while sent < size {
            let want = usize::try_from(size - sent).map_or(self.chunk_size, |left| {
                left.min(self.chunk_size)
            });
            let n = tether_proto::read_full(&mut file, &mut buf[..want]).await?;
            if n < want {
                return Err(Error::SourceChanged {
                    path: path.to_path_buf(),
                    sent,
                    size,
                });
            }
            self.writer.write_all(&buf[..n]).await?;
            sent += n as u64;
        }
        self.writer.flush().await?;

        let elapsed = started.elapsed();
        info!(name, size, ?elapsed, "file sent");
        Ok(SentFile {
            name: name.to_owned(),
            size,
            checksum,
            elapsed,
        })
    }

    /// Closes the write direction. The peer sees a clean end of stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
