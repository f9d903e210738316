//! Content-type detection from leading bytes.
//!
//! Client supplied MIME types are never trusted for uploads; the first
//! `SNIFF_LEN` bytes decide.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

/// Number of leading bytes considered when sniffing.
pub const SNIFF_LEN: usize = 512;

pub const VIDEO_MP4: &str = "video/mp4";
pub const IMAGE_PNG: &str = "image/png";
pub const IMAGE_JPEG: &str = "image/jpeg";
const OCTET_STREAM: &str = "application/octet-stream";

/// Magic prefixes checked before the ISO-BMFF scan.
const SIGNATURES: [(&[u8], &str); 6] = [
    (b"\x89PNG\r\n\x1a\n", IMAGE_PNG),
    (b"\xff\xd8\xff", IMAGE_JPEG),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x1a\x45\xdf\xa3", "video/webm"),
    (b"%PDF-", "application/pdf"),
];

/// Detect the content type of `data`, looking at no more than `SNIFF_LEN` bytes.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| data.starts_with(magic)) {
        return *mime;
    }
    if data.len() >= 14 && &data[..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }
    if is_mp4(data) {
        return VIDEO_MP4;
    }
    OCTET_STREAM
}

/// An `ftyp` box whose major or compatible brands start with `mp4`.
///
/// Layout: 4-byte big-endian box size, `ftyp`, major brand, minor version,
/// then compatible brands until the end of the box. The minor version is
/// skipped.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|offset| *offset != 12)
        .any(|offset| data.get(offset..offset + 3) == Some(b"mp4".as_slice()))
}

/// Pull chunks from `stream` until at least `SNIFF_LEN` bytes are buffered or
/// the stream ends. The returned bytes are the full chunks read, so nothing
/// is lost when the caller goes on to copy the rest of the stream.
pub async fn read_head<S, E>(stream: &mut S) -> Result<Bytes, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut head = BytesMut::new();
    while head.len() < SNIFF_LEN {
        match stream.next().await {
            Some(chunk) => head.extend_from_slice(&chunk?),
            None => break,
        }
    }
    Ok(head.freeze())
}
