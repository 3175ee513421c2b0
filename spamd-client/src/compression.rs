//! zlib framing for `Compress: zlib` bodies.

use std::io::{self, Read, Write};

use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

/// Value of the `Compress` header.
pub const ZLIB: &str = "zlib";

/// Compresses a request body.
///
/// # Errors
///
/// Returns the encoder's I/O error if compression fails.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompresses a response body, refusing to inflate past `limit` bytes.
///
/// # Errors
///
/// Returns `InvalidData` if the stream is corrupt or inflates beyond `limit`.
pub fn decompress(data: &[u8], limit: usize) -> io::Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    ZlibDecoder::new(data).take(cap).read_to_end(&mut inflated)?;

    if inflated.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed body exceeds {limit} bytes"),
        ));
    }

    Ok(inflated)
}
