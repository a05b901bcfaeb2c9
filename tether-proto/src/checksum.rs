//! MD5 digests as carried in file frame headers.
//!
//! The digest detects transfer corruption; it is not a security measure.

use std::fmt;
use std::io;

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Length of a hex-encoded MD5 digest on the wire.
pub const CHECKSUM_LEN: usize = 32;

/// A hex MD5 digest, kept as the 32 ASCII bytes that travel on the wire.
///
/// Digests produced locally are lowercase. Digests read from a peer are
/// stored verbatim, so comparisons go through [`Checksum::matches`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Wraps the raw checksum field of a file header.
    pub const fn from_wire(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a 32-character hex string (either case).
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.as_bytes();
        if raw.len() != CHECKSUM_LEN || !raw.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let mut out = [0u8; CHECKSUM_LEN];
        for (dst, src) in out.iter_mut().zip(raw) {
            *dst = src.to_ascii_lowercase();
        }
        Some(Self(out))
    }

    /// Digest of an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        let mut h = Hasher::new();
        h.update(data);
        h.finish()
    }

    /// Wire bytes of this checksum.
    pub const fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    /// Compares two checksums, ignoring ASCII case.
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({self})")
    }
}

/// Incremental MD5 over a byte stream.
#[derive(Clone, Default)]
pub struct Hasher(Md5);

impl Hasher {
    /// Creates an empty hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Consumes the hasher and returns the hex digest.
    pub fn finish(self) -> Checksum {
        let hex = format!("{:x}", self.0.finalize());
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(hex.as_bytes());
        Checksum(out)
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

/// Hashes everything `r` yields, reading `chunk` bytes at a time.
///
/// Returns the digest and the number of bytes hashed.
pub async fn checksum_reader<R: AsyncRead + Unpin>(
    r: &mut R,
    chunk: usize,
) -> io::Result<(Checksum, u64)> {
    let mut buf = vec![0u8; chunk.max(1)];
    let mut hasher = Hasher::new();
    let mut total = 0u64;
    loop {
        let n = r.read(&mut buf).await?;
        if n == 0 {
            return Ok((hasher.finish(), total));
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
}
