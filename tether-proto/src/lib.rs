//! Wire protocol for tether peer-to-peer chat.
//!
//! Two frame kinds share one byte stream, each introduced by a single
//! discriminant byte:
//!
//! - text: `['T'][u32 big-endian length][UTF-8 payload]`
//! - file: `['F'][u8 name length][name][u64 big-endian size][32-byte hex MD5][payload]`
//!
//! Frames are self-delimiting; there is no handshake and no resync marker,
//! so any decoding error leaves the stream unusable.

mod checksum;
mod codec;
mod error;
mod frame;

pub use checksum::{CHECKSUM_LEN, Checksum, Hasher, checksum_reader};
pub use codec::{
    check_name, decode_frame_header, encode_file_header, encode_text, read_file_header, read_full,
    read_header, read_kind, read_text, read_text_header,
};
pub use error::{EncodeError, ProtocolError};
pub use frame::{CHUNK_SIZE, DEFAULT_PORT, FileHeader, FrameHeader, Kind, MAX_NAME_LEN};
