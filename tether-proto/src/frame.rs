//! Frame types shared by both directions of a connection.

use crate::Checksum;

/// Default TCP port for the listening peer.
pub const DEFAULT_PORT: u16 = 12345;

/// Chunk size used when streaming file payloads.
pub const CHUNK_SIZE: usize = 4096;

/// Longest file name (in bytes) a file frame can carry.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Frame discriminant, the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum Kind {
    /// `'T'`: a UTF-8 text message.
    Text,
    /// `'F'`: a whole-file transfer.
    File,
}

impl Kind {
    /// Maps a wire byte to a frame kind.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'T' => Some(Self::Text),
            b'F' => Some(Self::File),
            _ => None,
        }
    }

    /// Wire byte for this kind.
    pub const fn byte(self) -> u8 {
        match self {
            Self::Text => b'T',
            Self::File => b'F',
        }
    }
}

/// Decoded fixed-layout header of a frame.
///
/// For [`FrameHeader::Text`] the payload follows immediately and is read with
/// [`read_text`](crate::read_text). For [`FrameHeader::File`] exactly
/// `size` raw bytes follow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum FrameHeader {
    /// Text frame header.
    Text {
        /// Payload length in bytes (not characters).
        length: u32,
    },
    /// File frame header.
    File(FileHeader),
}

impl FrameHeader {
    /// Discriminant of this header.
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Text { .. } => Kind::Text,
            Self::File(_) => Kind::File,
        }
    }
}

/// Header of a file frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FileHeader {
    /// File name as declared by the sender. Untrusted.
    pub name: String,
    /// Exact payload length in bytes.
    pub size: u64,
    /// MD5 digest of the whole payload.
    pub checksum: Checksum,
}

impl FileHeader {
    /// Creates a file header.
    pub fn new(name: impl Into<String>, size: u64, checksum: Checksum) -> Self {
        Self {
            name: name.into(),
            size,
            checksum,
        }
    }
}
