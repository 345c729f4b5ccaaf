//! Codec registry for bundle blocks.
//!
//! # Identity rules
//! Every compressed region in a bundle (the directory block and each data
//! block) carries a flags word whose low 6 bits name its codec.  Higher bits
//! are not part of the codec identity and are ignored here.
//!
//! Only identity and LZ4 are decoded.  The two LZ4 ids differ in how the
//! encoder searched for matches, never in the block format, so both resolve
//! to the same decoder.  The remaining known ids fail with
//! [`CodecError::Unimplemented`]; ids outside the table fail with
//! [`CodecError::Unsupported`].
//!
//! # Output contract
//! Decoding is all-or-nothing: exactly the declared uncompressed length is
//! produced, or an error is returned.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Mask selecting the codec id from a block or header flags word.
pub const CODEC_MASK: u32 = 0x3F;

// ── CompressionType enum ─────────────────────────────────────────────────────

/// Known codec ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    None  = 0,
    Lzma  = 1,
    Lz4   = 2,
    Lz4Hc = 3,
    Lzham = 4,
    /// Not an engine-defined id; seen in third-party repackers.
    Lzfse = 10,
    /// Not an engine-defined id; seen in third-party repackers.
    Zlib  = 11,
}

impl CompressionType {
    /// Resolve a raw codec id.
    pub fn from_id(id: u32) -> Result<Self, CodecError> {
        match id {
            0  => Ok(CompressionType::None),
            1  => Ok(CompressionType::Lzma),
            2  => Ok(CompressionType::Lz4),
            3  => Ok(CompressionType::Lz4Hc),
            4  => Ok(CompressionType::Lzham),
            10 => Ok(CompressionType::Lzfse),
            11 => Ok(CompressionType::Zlib),
            _  => Err(CodecError::Unsupported(id)),
        }
    }

    /// Resolve the codec named by the low 6 bits of a flags word.
    #[inline]
    pub fn from_flags(flags: u32) -> Result<Self, CodecError> {
        Self::from_id(flags & CODEC_MASK)
    }

    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Human-readable name, for diagnostics only.
    pub fn name(self) -> &'static str {
        match self {
            CompressionType::None  => "none",
            CompressionType::Lzma  => "lzma",
            CompressionType::Lz4   => "lz4",
            CompressionType::Lz4Hc => "lz4hc",
            CompressionType::Lzham => "lzham",
            CompressionType::Lzfse => "lzfse",
            CompressionType::Zlib  => "zlib",
        }
    }

    /// Whether this build can decode the codec.
    pub fn is_supported(self) -> bool {
        get_codec(self).is_ok()
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// The codec id is known but this build has no decoder for it.
    #[error("Unimplemented codec: {0}")]
    Unimplemented(CompressionType),
    /// The codec id is not in the known table.
    #[error("Unsupported codec id: {0}")]
    Unsupported(u32),
    #[error("Compressed input truncated: declared {declared} bytes, got {actual}")]
    Truncated { declared: usize, actual: usize },
    #[error("Decoded length mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Decompression error: {0}")]
    Decompression(String),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compression_type(&self) -> CompressionType;
    /// Decode `data` into a buffer of `uncompressed_len` bytes.
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn compression_type(&self) -> CompressionType { CompressionType::None }
    fn decompress(&self, data: &[u8], _: usize) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

/// Raw LZ4 block decoder, shared by [`CompressionType::Lz4`] and
/// [`CompressionType::Lz4Hc`].
pub struct Lz4Codec {
    variant: CompressionType,
}

impl Codec for Lz4Codec {
    fn compression_type(&self) -> CompressionType { self.variant }
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, CodecError> {
        lz4_flex::block::decompress(data, uncompressed_len)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a [`CompressionType`] to a built-in codec.
pub fn get_codec(kind: CompressionType) -> Result<Box<dyn Codec>, CodecError> {
    match kind {
        CompressionType::None => Ok(Box::new(NoneCodec)),
        CompressionType::Lz4 | CompressionType::Lz4Hc => Ok(Box::new(Lz4Codec { variant: kind })),
        CompressionType::Lzma
        | CompressionType::Lzham
        | CompressionType::Lzfse
        | CompressionType::Zlib => Err(CodecError::Unimplemented(kind)),
    }
}

/// Decode one compressed region.
///
/// `codec_id` is the raw id (already masked, or a full flags word: only the
/// low 6 bits are consulted).  The first `declared_compressed_len` bytes of
/// `compressed` are the input; anything after them is ignored.
pub fn decode(
    codec_id:                  u32,
    compressed:                &[u8],
    declared_compressed_len:   usize,
    declared_uncompressed_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let kind  = CompressionType::from_flags(codec_id)?;
    let codec = get_codec(kind)?;

    if compressed.len() < declared_compressed_len {
        return Err(CodecError::Truncated {
            declared: declared_compressed_len,
            actual:   compressed.len(),
        });
    }
    let out = codec.decompress(&compressed[..declared_compressed_len], declared_uncompressed_len)?;
    if out.len() != declared_uncompressed_len {
        return Err(CodecError::SizeMismatch {
            expected: declared_uncompressed_len,
            actual:   out.len(),
        });
    }
    Ok(out)
}
