//! Incoming file transfers.
//!
//! Each file frame walks `AwaitingHeader -> ReceivingPayload -> Verifying`
//! and ends in `Committed` or `Failed`. Whatever happens to the destination
//! file, exactly `size` payload bytes are consumed from the stream unless the
//! stream itself ends or fails, so the next frame stays aligned.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tether_proto::{Checksum, FileHeader, ProtocolError};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::deadline::Timed;
use crate::{Config, Destination, TransferError};

/// Lifecycle of one incoming file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransferState {
    /// Reading the name, size and checksum fields.
    AwaitingHeader,
    /// Streaming payload bytes to the destination file.
    ReceivingPayload,
    /// Re-reading the written file to compare digests.
    Verifying,
    /// The file is on disk and its digest matches.
    Committed,
    /// The transfer failed; see [`Outcome::result`].
    Failed,
}

/// A verified file on local storage.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Received {
    /// Final path, after collision handling.
    pub path: PathBuf,
    /// Payload size in bytes.
    pub size: u64,
    /// Time from header to verified file.
    pub elapsed: Duration,
}

/// How one file frame ended.
#[derive(Debug)]
#[non_exhaustive]
pub struct Outcome {
    /// The header as received.
    pub header: FileHeader,
    /// [`TransferState::Committed`] or [`TransferState::Failed`].
    pub state: TransferState,
    /// The file, or why there is none.
    pub result: Result<Received, TransferError>,
    /// Set when the payload stopped because the socket failed or timed out
    /// rather than closed. The connection cannot continue after this.
    pub stream_error: Option<io::Error>,
}

/// Tracks the current state of a transfer and logs each step.
#[derive(Debug)]
struct Progress {
    state: TransferState,
}

impl Progress {
    fn advance(&mut self, next: TransferState, name: &str) {
        trace!(name, from = ?self.state, to = ?next, "transfer state");
        self.state = next;
    }
}

/// A destination file that is deleted on drop unless kept.
///
/// Dropping covers every early exit, including the receive task being
/// aborted in the middle of a payload.
#[derive(Debug)]
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    /// Leaves the file on disk and returns its path.
    fn keep(mut self) -> Option<PathBuf> {
        self.path.take()
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = std::fs::remove_file(&path)
        {
            debug!(path = %path.display(), error = %e, "could not remove partial file");
        }
    }
}

/// Receives one file frame whose discriminant has already been consumed.
///
/// `on_header` runs once the header is decoded, before any payload is read.
/// Header errors are connection-level and returned as `Err`; everything that
/// goes wrong afterwards is reported in the [`Outcome`].
pub async fn receive_file<R: AsyncRead + Unpin>(
    r: &mut R,
    dest: &Destination,
    config: &Config,
    on_header: impl FnOnce(&FileHeader),
) -> Result<Outcome, ProtocolError> {
    let mut progress = Progress {
        state: TransferState::AwaitingHeader,
    };
    let mut r = Timed::new(r, config.read_timeout);
    let header = tether_proto::read_file_header(&mut r).await?;
    on_header(&header);
    let started = Instant::now();
    info!(name = %header.name, size = header.size, checksum = %header.checksum, "receiving file");

    progress.advance(TransferState::ReceivingPayload, &header.name);
    let (partial, mut file, mut failure) = match dest.create(&header.name).await {
        Ok((path, file)) => (PartialFile { path: Some(path) }, Some(file), None),
        Err(e) => {
            warn!(name = %header.name, error = %e, "cannot store file, discarding payload");
            (PartialFile { path: None }, None, Some(e))
        }
    };

    let chunk = config.chunk();
    let mut buf = vec![0u8; chunk];
    let mut received = 0u64;
    let mut stream_error = None;
    while received < header.size {
        let want = usize::try_from(header.size - received).map_or(chunk, |left| left.min(chunk));
        let n = match r.read(&mut buf[..want]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                stream_error = Some(e);
                break;
            }
        };
        let write_err = match file.as_mut() {
            Some(f) => f.write_all(&buf[..n]).await.err(),
            None => None,
        };
        if let Some(e) = write_err {
            warn!(name = %header.name, error = %e, "write failed, discarding rest of payload");
            failure = Some(e.into());
            file = None;
        }
        received += n as u64;
    }
    debug!(name = %header.name, received, size = header.size, "payload finished");

    if let Some(f) = file.as_mut()
        && let Err(e) = f.flush().await
    {
        failure.get_or_insert(e.into());
    }
    drop(file);

    let verified = if received < header.size {
        Err(TransferError::Incomplete {
            received,
            size: header.size,
        })
    } else if let Some(e) = failure {
        Err(e)
    } else if let Some(path) = partial.path() {
        progress.advance(TransferState::Verifying, &header.name);
        verify(path, &header.checksum, chunk).await
    } else {
        Err(TransferError::InvalidName(header.name.clone()))
    };

    let result = match verified {
        Ok(()) => partial
            .keep()
            .map(|path| Received {
                path,
                size: header.size,
                elapsed: started.elapsed(),
            })
            .ok_or_else(|| TransferError::InvalidName(header.name.clone())),
        Err(e @ TransferError::ChecksumMismatch { .. }) if !config.discard_corrupt => {
            partial.keep();
            Err(e)
        }
        Err(e) => {
            drop(partial);
            Err(e)
        }
    };

    match &result {
        Ok(done) => {
            progress.advance(TransferState::Committed, &header.name);
            info!(
                name = %header.name,
                path = %done.path.display(),
                elapsed = ?done.elapsed,
                "file received"
            );
        }
        Err(e) => {
            progress.advance(TransferState::Failed, &header.name);
            warn!(name = %header.name, error = %e, "file transfer failed");
        }
    }

    Ok(Outcome {
        header,
        state: progress.state,
        result,
        stream_error,
    })
}

/// Hashes the file at `path` and compares it with the declared digest.
async fn verify(path: &Path, expected: &Checksum, chunk: usize) -> Result<(), TransferError> {
    let mut file = File::open(path).await?;
    let (actual, _) = tether_proto::checksum_reader(&mut file, chunk).await?;
    if actual.matches(expected) {
        Ok(())
    } else {
        Err(TransferError::ChecksumMismatch {
            expected: *expected,
            actual,
        })
    }
}
