//! Frame codec over any `AsyncRead` stream.
//!
//! Encoding produces complete header bytes so the caller can hand them to a
//! single `write_all`; file payloads are streamed separately. Decoding is
//! split into [`read_kind`] and [`read_header`] so callers can apply a
//! different deadline to the wait for the next frame than to the frame body.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{CHECKSUM_LEN, Checksum, EncodeError, FileHeader, FrameHeader, Kind, ProtocolError};

/// Reads until `buf` is full or the stream ends.
///
/// Returns the number of bytes read; a value short of `buf.len()` means the
/// peer closed the connection. Partial reads are retried.
pub async fn read_full<R: AsyncRead + Unpin>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fills `buf` completely or fails with [`ProtocolError::Truncated`].
async fn read_field<R: AsyncRead + Unpin>(r: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError> {
    let received = read_full(r, buf).await?;
    if received < buf.len() {
        return Err(ProtocolError::Truncated {
            expected: buf.len(),
            received,
        });
    }
    Ok(())
}

/// Validates a file name for the 1-byte length field and returns its length.
pub fn check_name(name: &str) -> Result<u8, EncodeError> {
    if name.is_empty() {
        return Err(EncodeError::EmptyName);
    }
    u8::try_from(name.len()).map_err(|_| EncodeError::NameTooLong(name.len()))
}

/// Encodes a complete text frame.
pub fn encode_text(text: &str) -> Result<Vec<u8>, EncodeError> {
    let payload = text.as_bytes();
    let len = u32::try_from(payload.len()).map_err(|_| EncodeError::TextTooLong(payload.len()))?;
    let mut buf = Vec::with_capacity(1 + 4 + payload.len());
    buf.push(Kind::Text.byte());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encodes the header of a file frame. The `size` payload bytes follow it.
pub fn encode_file_header(
    name: &str,
    size: u64,
    checksum: &Checksum,
) -> Result<Vec<u8>, EncodeError> {
    let name_len = check_name(name)?;
    let mut buf = Vec::with_capacity(1 + 1 + name.len() + 8 + CHECKSUM_LEN);
    buf.push(Kind::File.byte());
    buf.push(name_len);
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(checksum.as_bytes());
    Ok(buf)
}

/// Reads the discriminant of the next frame.
///
/// Returns `None` when the peer closed the connection cleanly between frames.
pub async fn read_kind<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<Kind>, ProtocolError> {
    let mut byte = [0u8; 1];
    if read_full(r, &mut byte).await? == 0 {
        return Ok(None);
    }
    Kind::from_byte(byte[0])
        .map(Some)
        .ok_or(ProtocolError::UnknownDiscriminant(byte[0]))
}

/// Reads the type-specific header that follows a discriminant.
pub async fn read_header<R: AsyncRead + Unpin>(
    r: &mut R,
    kind: Kind,
) -> Result<FrameHeader, ProtocolError> {
    match kind {
        Kind::Text => read_text_header(r)
            .await
            .map(|length| FrameHeader::Text { length }),
        Kind::File => read_file_header(r).await.map(FrameHeader::File),
    }
}

/// Reads the length field of a text frame, after its discriminant.
pub async fn read_text_header<R: AsyncRead + Unpin>(r: &mut R) -> Result<u32, ProtocolError> {
    let mut len = [0u8; 4];
    read_field(r, &mut len).await?;
    Ok(u32::from_be_bytes(len))
}

/// Reads the header fields of a file frame, after its discriminant.
pub async fn read_file_header<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<FileHeader, ProtocolError> {
    let mut name_len = [0u8; 1];
    read_field(r, &mut name_len).await?;
    let mut name = vec![0u8; usize::from(name_len[0])];
    read_field(r, &mut name).await?;
    let mut size = [0u8; 8];
    read_field(r, &mut size).await?;
    let mut checksum = [0u8; CHECKSUM_LEN];
    read_field(r, &mut checksum).await?;
    Ok(FileHeader::new(
        String::from_utf8_lossy(&name),
        u64::from_be_bytes(size),
        Checksum::from_wire(checksum),
    ))
}

/// Reads a whole frame header, discriminant included.
///
/// Returns `None` on a clean end of stream before the discriminant.
pub async fn decode_frame_header<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<Option<FrameHeader>, ProtocolError> {
    match read_kind(r).await? {
        Some(kind) => read_header(r, kind).await.map(Some),
        None => Ok(None),
    }
}

/// Reads a text payload of `length` bytes.
///
/// The buffer grows as bytes arrive rather than trusting `length` up front.
/// Invalid UTF-8 is replaced, since the stream itself is still aligned.
pub async fn read_text<R: AsyncRead + Unpin>(
    r: &mut R,
    length: u32,
) -> Result<String, ProtocolError> {
    let mut payload = Vec::new();
    let received = r.take(u64::from(length)).read_to_end(&mut payload).await?;
    let expected = usize::try_from(length).unwrap_or(usize::MAX);
    if received < expected {
        return Err(ProtocolError::Truncated { expected, received });
    }
    match String::from_utf8(payload) {
        Ok(text) => Ok(text),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}
