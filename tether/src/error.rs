//! Error types for tether sessions.

use std::io;
use std::path::PathBuf;

use tether_proto::{Checksum, EncodeError, ProtocolError};

/// Alias for `Result<T, tether::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from session operations.
///
/// On the receive side any of these ends the session. On the send side only
/// socket failures and [`Error::SourceChanged`] do; the rest leave nothing on
/// the wire.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The incoming stream could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An outgoing frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A file shrank after its header was sent, so the stream is misaligned.
    #[error("{}: file changed while sending ({sent} of {size} bytes)", path.display())]
    SourceChanged {
        /// Source file on the local disk.
        path: PathBuf,
        /// Payload bytes written before the file ran out.
        sent: u64,
        /// Size announced in the header.
        size: u64,
    },

    /// An I/O error on the socket or on a file being sent.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure of a single incoming file. The connection stays open.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransferError {
    /// The payload ended before the declared size.
    #[error("file incomplete ({received}/{size} bytes received)")]
    Incomplete {
        /// Payload bytes received.
        received: u64,
        /// Size declared in the header.
        size: u64,
    },

    /// The whole payload arrived but its digest disagrees with the header.
    #[error("checksum mismatch (expected {expected}, got {actual}), transfer may be corrupted")]
    ChecksumMismatch {
        /// Digest declared by the sender.
        expected: Checksum,
        /// Digest of the bytes written to disk.
        actual: Checksum,
    },

    /// The sender-declared name has no usable file name component.
    #[error("invalid file name {0:?}")]
    InvalidName(String),

    /// The destination already exists and collisions are rejected.
    #[error("{} already exists", .0.display())]
    Exists(PathBuf),

    /// Creating, writing, or re-reading the destination file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
