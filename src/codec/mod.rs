//! Compression capability and the per-file compression policy.
//!
//! # Policy
//! Only files whose extension is on [`COMPRESSIBLE_EXTENSIONS`] are offered
//! to the codec, and the compressed form is kept only when it saves at
//! least [`MIN_SAVINGS`] bytes.  Everything else is stored verbatim, so
//! already-dense content never costs a compression pass or grows on disk.
//!
//! The container records a single `compressed` flag per entry; the codec
//! behind that flag is fixed to raw DEFLATE for every container version.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use thiserror::Error;

/// Extensions (lower-case, without the dot) eligible for compression.
pub const COMPRESSIBLE_EXTENSIONS: &[&str] = &[
    "txt", "json", "rul", "yaml", "yml", "js", "css", "html", "svg",
];

/// Minimum number of bytes compression must save to be kept.
pub const MIN_SAVINGS: usize = 8;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Raw DEFLATE (RFC 1951), no zlib/gzip framing.
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: Compression::best() }
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str { "deflate" }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        enc.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Policy ───────────────────────────────────────────────────────────────────

/// Whether `path`'s extension is on the allow-list (case-insensitive).
pub fn is_compressible(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            COMPRESSIBLE_EXTENSIONS.iter().any(|c| *c == e)
        })
        .unwrap_or(false)
}

/// Apply the compression policy to one file.
///
/// Returns the payload to encrypt and whether it is the compressed form.
/// A codec failure is not fatal: the raw bytes are returned instead.
pub fn choose_payload<'a>(codec: &dyn Codec, path: &str, raw: &'a [u8]) -> (Cow<'a, [u8]>, bool) {
    if !is_compressible(path) {
        return (Cow::Borrowed(raw), false);
    }
    match codec.compress(raw) {
        Ok(packed) if packed.len() + MIN_SAVINGS <= raw.len() => (Cow::Owned(packed), true),
        Ok(_) => (Cow::Borrowed(raw), false),
        Err(e) => {
            tracing::debug!(path, error = %e, "compression failed, storing raw");
            (Cow::Borrowed(raw), false)
        }
    }
}
