//! Container header: the common prefix shared by every bundle variant, plus
//! the variant-specific fields that follow it.
//!
//! ```text
//! common:  cstring signature | i32 version | cstring engine | cstring generator
//! UnityFS: i64 total_file_size | u32 compressed_dir | u32 uncompressed_dir | u32 flags
//! legacy:  u32 file_size | i32 header_size | i32 file_count | i32 bundle_count
//!          [v >= 2] u32 bundle_size
//!          [v >= 3] u32 uncompressed_bundle_size
//!          [header_size >= 60] u32 compressed_file_size | u32 asset_header_size
//!          cstring name
//! ```
//!
//! All fields use the outer source's endianness (big-endian by default).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::byte_source::ByteSource;
use crate::codec::{CodecError, CompressionType};
use crate::error::{BundleError, Result};

/// Header size at and above which legacy headers carry two extra size fields.
pub const LEGACY_EXTENDED_HEADER_SIZE: i32 = 60;

// ── Signature ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signature {
    /// Modern block-storage container.
    UnityFS,
    /// Compressed legacy container.
    UnityWeb,
    /// Uncompressed legacy container.
    UnityRaw,
}

impl Signature {
    pub fn as_str(self) -> &'static str {
        match self {
            Signature::UnityFS  => "UnityFS",
            Signature::UnityWeb => "UnityWeb",
            Signature::UnityRaw => "UnityRaw",
        }
    }

    pub fn is_unity_fs(self) -> bool {
        self == Signature::UnityFS
    }

    /// True for the legacy variant whose payload is compressed as a whole.
    pub fn is_compressed(self) -> bool {
        self == Signature::UnityWeb
    }
}

impl FromStr for Signature {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UnityFS"  => Ok(Signature::UnityFS),
            "UnityWeb" => Ok(Signature::UnityWeb),
            "UnityRaw" => Ok(Signature::UnityRaw),
            other      => Err(BundleError::UnsupportedFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── BundleDescriptor ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleDescriptor {
    pub signature:         Signature,
    pub format_version:    i32,
    pub engine_version:    String,
    pub generator_version: String,
}

impl BundleDescriptor {
    pub fn read<S: ByteSource>(src: &mut S) -> Result<Self> {
        let signature         = src.read_cstring()?.parse::<Signature>()?;
        let format_version    = src.read_i32()?;
        let engine_version    = src.read_cstring()?;
        let generator_version = src.read_cstring()?;
        Ok(Self { signature, format_version, engine_version, generator_version })
    }
}

// ── ModernHeader ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModernHeader {
    pub total_file_size:        u64,
    pub compressed_dir_size:    u32,
    pub uncompressed_dir_size:  u32,
    pub flags:                  u32,
}

impl ModernHeader {
    pub fn read<S: ByteSource>(src: &mut S) -> Result<Self> {
        let total_file_size = src.read_i64()?;
        if total_file_size < 0 {
            return Err(BundleError::malformed(format!(
                "negative total file size {total_file_size}"
            )));
        }
        Ok(Self {
            total_file_size:       total_file_size as u64,
            compressed_dir_size:   src.read_u32()?,
            uncompressed_dir_size: src.read_u32()?,
            flags:                 src.read_u32()?,
        })
    }

    /// Codec of the directory block (low 6 bits of `flags`).
    pub fn directory_codec(&self) -> std::result::Result<CompressionType, CodecError> {
        CompressionType::from_flags(self.flags)
    }
}

// ── LegacyHeader ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyHeader {
    pub file_size:                u32,
    pub header_size:              u32,
    pub file_count:               u32,
    pub bundle_count:             u32,
    /// Present from format version 2.
    pub bundle_size:              Option<u32>,
    /// Present from format version 3.
    pub uncompressed_bundle_size: Option<u32>,
    /// Present when `header_size >= 60`.
    pub compressed_file_size:     Option<u32>,
    /// Present when `header_size >= 60`.
    pub asset_header_size:        Option<u32>,
    pub name:                     String,
}

impl LegacyHeader {
    pub fn read<S: ByteSource>(src: &mut S, format_version: i32) -> Result<Self> {
        let file_size    = src.read_u32()?;
        let header_size  = src.read_i32()?;
        let file_count   = src.read_i32()?;
        let bundle_count = src.read_i32()?;
        for (field, value) in [("header size", header_size), ("file count", file_count), ("bundle count", bundle_count)] {
            if value < 0 {
                return Err(BundleError::malformed(format!("negative legacy {field} {value}")));
            }
        }

        let bundle_size = if format_version >= 2 { Some(src.read_u32()?) } else { None };
        let uncompressed_bundle_size = if format_version >= 3 { Some(src.read_u32()?) } else { None };
        let (compressed_file_size, asset_header_size) = if header_size >= LEGACY_EXTENDED_HEADER_SIZE {
            (Some(src.read_u32()?), Some(src.read_u32()?))
        } else {
            (None, None)
        };
        let name = src.read_cstring()?;

        Ok(Self {
            file_size,
            header_size:  header_size as u32,
            file_count:   file_count as u32,
            bundle_count: bundle_count as u32,
            bundle_size,
            uncompressed_bundle_size,
            compressed_file_size,
            asset_header_size,
            name,
        })
    }
}
