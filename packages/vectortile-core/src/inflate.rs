use std::borrow::Cow;
use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::console_log;
use crate::error::{DecodeError, DecodeResult};

/// Gzip magic number.
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

/// Deflate-method zlib header with a valid check value.
pub fn is_zlib(data: &[u8]) -> bool {
    data.len() >= 2
        && data[0] & 0x0F == 8
        && data[0] >> 4 <= 7
        && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
}

pub fn inflate(data: &[u8]) -> DecodeResult<Cow<'_, [u8]>> {
    let mut inflated = Vec::new();
    if is_gzipped(data) {
        console_log!("Detected gzipped tile, decompressing...");
        GzDecoder::new(data)
            .read_to_end(&mut inflated)
            .map_err(|e| DecodeError::Decompress(format!("gzip: {}", e)))?;
    } else if is_zlib(data) {
        console_log!("Detected zlib tile, decompressing...");
        ZlibDecoder::new(data)
            .read_to_end(&mut inflated)
            .map_err(|e| DecodeError::Decompress(format!("zlib: {}", e)))?;
    } else {
        return Ok(Cow::Borrowed(data));
    }
    Ok(Cow::Owned(inflated))
}
