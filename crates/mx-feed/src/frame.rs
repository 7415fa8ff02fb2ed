//! Inbound frame decoding.
//!
//! Exchanges interleave heartbeats, acks and data on one stream, and some send
//! binary frames: plain UTF-8 JSON, or gzip/zlib-compressed text (BingX
//! compresses every push, its `Ping` included). Compressed payloads are
//! inflated here. Anything that still cannot be read as JSON or a textual
//! heartbeat is discarded before any parser sees it.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use tracing::debug;

use crate::descriptor::is_heartbeat;

/// One inbound WebSocket data frame.
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Whether the payload starts like a gzip or zlib stream.
pub fn looks_compressed(data: &[u8]) -> bool {
    match data {
        [0x1f, 0x8b, ..] => true,
        // zlib header: CMF 0x78 with a valid FCHECK.
        [0x78, flg, ..] => (0x78u16 * 256 + *flg as u16) % 31 == 0,
        _ => false,
    }
}

/// Text content of any frame. Text frames pass through untouched.
pub fn decode(frame: Frame<'_>) -> Option<Cow<'_, str>> {
    match frame {
        Frame::Text(text) => Some(Cow::Borrowed(text)),
        Frame::Binary(data) => decode_binary(data),
    }
}

/// Decode a binary frame, inflating gzip/zlib payloads.
///
/// Returns `None` for corrupt compressed data, invalid UTF-8, and text that is
/// neither JSON-shaped nor a heartbeat.
pub fn decode_binary(data: &[u8]) -> Option<Cow<'_, str>> {
    if data.is_empty() {
        return None;
    }
    let text = if looks_compressed(data) {
        let mut out = String::new();
        let res = match data {
            [0x1f, 0x8b, ..] => GzDecoder::new(data).read_to_string(&mut out),
            _ => ZlibDecoder::new(data).read_to_string(&mut out),
        };
        if let Err(e) = res {
            debug!("discarding undecodable compressed frame ({} bytes): {e}", data.len());
            return None;
        }
        Cow::Owned(out)
    } else {
        Cow::Borrowed(std::str::from_utf8(data).ok()?)
    };
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') || is_heartbeat(&text) { Some(text) } else { None }
}
