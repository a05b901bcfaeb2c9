//! Protocol error types.

use std::io;

/// A failure that leaves the stream unusable.
///
/// Every variant ends the connection: without a resync marker there is no
/// way to find the start of the next frame.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated {
        /// Bytes the field or payload required.
        expected: usize,
        /// Bytes actually read before end of stream.
        received: usize,
    },

    /// A byte other than `'T'` or `'F'` where a frame should start.
    #[error("unknown frame discriminant 0x{0:02x}")]
    UnknownDiscriminant(u8),

    /// Socket-level failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A frame that cannot be encoded. Nothing has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// The file name does not fit the 1-byte length field.
    #[error("file name is {0} bytes, limit is 255")]
    NameTooLong(usize),

    /// The file name is empty.
    #[error("file name is empty")]
    EmptyName,

    /// The text does not fit the 4-byte length field.
    #[error("text is {0} bytes, limit is 4294967295")]
    TextTooLong(usize),
}
