//! The compressed directory block of a UnityFS bundle.
//!
//! The directory immediately follows the modern header.  Once decompressed it
//! holds, in the directory endianness (little-endian by default):
//!
//! ```text
//! [u8; 16]  hash (opaque)
//! i32       block count
//!           block count × { i32 uncompressed, i32 compressed, u16 flags }
//! i32       asset count
//!           asset count × { i64 offset, i64 size, u32 status, cstring name }
//! ```

use serde::Serialize;
use tracing::debug;

use crate::block::{BlockInfoTable, CompressedBlockSpan};
use crate::bundle::OpenOptions;
use crate::byte_source::{ByteSource, SliceSource};
use crate::codec;
use crate::error::{BundleError, Result};
use crate::header::ModernHeader;
use crate::index::{AssetIndex, AssetRecord};

/// Smallest encoded block descriptor, used to bound up-front allocation.
const BLOCK_DESCRIPTOR_SIZE: usize = 10;
/// Smallest encoded asset record (empty name).
const ASSET_RECORD_MIN_SIZE: usize = 21;

/// Header-level facts about a UnityFS bundle's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    pub header: ModernHeader,
    pub hash:   [u8; 16],
}

impl DirectoryInfo {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// A decoded directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub hash:   [u8; 16],
    pub blocks: BlockInfoTable,
    pub assets: AssetIndex,
}

/// Read and decode the directory block that starts at the current position
/// of `src`.  On return `src` is positioned at the first data block.
pub fn load<S: ByteSource>(src: &mut S, header: &ModernHeader, options: &OpenOptions) -> Result<Directory> {
    let compressed_len   = header.compressed_dir_size as usize;
    let uncompressed_len = header.uncompressed_dir_size as usize;
    if compressed_len > options.max_block_size || uncompressed_len > options.max_block_size {
        return Err(BundleError::malformed(format!(
            "directory sizes {compressed_len}/{uncompressed_len} exceed limit {}",
            options.max_block_size
        )));
    }

    let codec_kind = header.directory_codec()?;
    let raw  = src.read_bytes(compressed_len)?;
    if raw.len() < compressed_len {
        return Err(BundleError::EndOfData { requested: compressed_len, available: raw.len() });
    }
    let data = codec::decode(header.flags, &raw, compressed_len, uncompressed_len)?;
    debug!(codec = %codec_kind, compressed_len, uncompressed_len, "directory block decoded");

    parse(SliceSource::new(data).with_endianness(options.directory_endianness), options)
}

/// Parse an already decompressed directory payload.
pub fn parse(mut dir: SliceSource, options: &OpenOptions) -> Result<Directory> {
    let hash = dir.read_array::<16>()?;

    let block_count = read_count(&mut dir, "block")?;
    let mut spans = Vec::with_capacity(block_count.min(dir.remaining() / BLOCK_DESCRIPTOR_SIZE));
    for i in 0..block_count {
        let span = CompressedBlockSpan::read(&mut dir)?;
        let largest = span.uncompressed_size.max(span.compressed_size) as usize;
        if largest > options.max_block_size {
            return Err(BundleError::malformed(format!(
                "block {i} declares {largest} bytes, limit is {}",
                options.max_block_size
            )));
        }
        spans.push(span);
    }

    let asset_count = read_count(&mut dir, "asset")?;
    let mut records = Vec::with_capacity(asset_count.min(dir.remaining() / ASSET_RECORD_MIN_SIZE));
    for _ in 0..asset_count {
        records.push(AssetRecord::read(&mut dir)?);
    }

    let blocks = BlockInfoTable::new(spans);
    debug!(
        blocks = blocks.len(),
        assets = records.len(),
        virtual_len = blocks.total_uncompressed(),
        "directory parsed"
    );
    Ok(Directory { hash, blocks, assets: AssetIndex::new(records) })
}

fn read_count(dir: &mut SliceSource, what: &str) -> Result<usize> {
    let n = dir.read_i32()?;
    usize::try_from(n).map_err(|_| BundleError::malformed(format!("negative {what} count {n}")))
}
