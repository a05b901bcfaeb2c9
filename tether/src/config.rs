//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use tether_proto::CHUNK_SIZE;

use crate::CollisionPolicy;

/// Directory received files land in when none is configured.
pub const DEFAULT_DEST_DIR: &str = "received_files";

/// Tunables shared by the send and receive duties of a session.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directory for received files. Created on the first incoming file.
    pub dest_dir: PathBuf,
    /// Bytes per read/write when streaming file payloads.
    pub chunk_size: usize,
    /// Upper bound on each read once a frame has started.
    ///
    /// A payload read that times out fails the transfer and then the
    /// connection, since late bytes would misalign the stream.
    pub read_timeout: Option<Duration>,
    /// Upper bound on the wait for the next frame. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// What to do when a received file name already exists.
    pub on_collision: CollisionPolicy,
    /// Delete received files whose checksum does not match.
    pub discard_corrupt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from(DEFAULT_DEST_DIR),
            chunk_size: CHUNK_SIZE,
            read_timeout: None,
            idle_timeout: None,
            on_collision: CollisionPolicy::default(),
            discard_corrupt: false,
        }
    }
}

impl Config {
    /// Chunk size clamped to at least one byte.
    pub(crate) fn chunk(&self) -> usize {
        self.chunk_size.max(1)
    }
}
