//! High-level [`Bundle`] API, the primary embedding surface.
//!
//! ```no_run
//! use bundlefs::bundle::{Bundle, OpenOptions};
//!
//! let mut bundle = Bundle::open_file("level0.bundle", &OpenOptions::default())?;
//! println!("{} {}", bundle.signature(), bundle.engine_version());
//! for record in bundle.assets().clone().iter() {
//!     let bytes = bundle.asset_reader(record)?.read_all()?;
//!     println!("{:<40} {:>10}", record.name, bytes.len());
//! }
//! # Ok::<(), bundlefs::BundleError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::BlockInfoTable;
use crate::byte_source::{resolve_seek, ByteSource, Endianness, StreamSource};
use crate::directory::{self, DirectoryInfo};
use crate::error::{BundleError, Result};
use crate::header::{BundleDescriptor, LegacyHeader, ModernHeader, Signature};
use crate::index::{AssetIndex, AssetRecord};
use crate::virtual_stream::VirtualBlockStream;

/// Default upper bound on any single declared block or directory size: 1 GiB.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1024 * 1024 * 1024;

// ── OpenOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`Bundle::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Byte order of the container header.
    pub header_endianness:    Endianness,
    /// Byte order of the decompressed directory tables.
    pub directory_endianness: Endianness,
    /// Byte order reported by asset readers to object decoders.
    pub asset_endianness:     Endianness,
    /// Largest directory or block size accepted, in bytes.
    pub max_block_size:       usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            header_endianness:    Endianness::Big,
            directory_endianness: Endianness::Little,
            asset_endianness:     Endianness::Big,
            max_block_size:       DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl OpenOptions {
    pub fn header_endianness(mut self, e: Endianness) -> Self {
        self.header_endianness = e;
        self
    }

    pub fn directory_endianness(mut self, e: Endianness) -> Self {
        self.directory_endianness = e;
        self
    }

    pub fn asset_endianness(mut self, e: Endianness) -> Self {
        self.asset_endianness = e;
        self
    }

    pub fn max_block_size(mut self, bytes: usize) -> Self {
        self.max_block_size = bytes;
        self
    }

    /// Load options from JSON; absent fields keep their defaults.
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Variant-specific header data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BundleLayout {
    Modern(DirectoryInfo),
    /// Legacy bundles: header only, no asset index.
    Legacy(LegacyHeader),
}

// ── Manifest ─────────────────────────────────────────────────────────────────

/// Serializable summary of an opened bundle, for inspectors.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    #[serde(flatten)]
    pub descriptor:  &'a BundleDescriptor,
    pub layout:      &'a BundleLayout,
    pub virtual_len: u64,
    pub blocks:      &'a [crate::block::CompressedBlockSpan],
    pub assets:      &'a AssetIndex,
}

impl Manifest<'_> {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── Bundle ───────────────────────────────────────────────────────────────────

pub struct Bundle<S: ByteSource> {
    descriptor: BundleDescriptor,
    layout:     BundleLayout,
    assets:     Arc<AssetIndex>,
    stream:     VirtualBlockStream<S>,
    options:    OpenOptions,
}

impl Bundle<StreamSource<BufReader<File>>> {
    /// Open a bundle file through a buffered stream source.
    pub fn open_file<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(StreamSource::new(BufReader::new(file)), options)
    }
}

impl<S: ByteSource> Bundle<S> {
    /// Parse the header (and, for UnityFS, the directory) from the start of
    /// `source`.  Any parse failure aborts; no partial handle is returned.
    ///
    /// The source's own endianness is not consulted: headers are read with
    /// `options.header_endianness`.
    pub fn open(source: S, options: &OpenOptions) -> Result<Self> {
        let mut src = HeaderReader { inner: source, endianness: options.header_endianness };
        src.seek(SeekFrom::Start(0))?;

        let descriptor = BundleDescriptor::read(&mut src)?;
        debug!(
            signature = %descriptor.signature,
            version = descriptor.format_version,
            engine = %descriptor.engine_version,
            "bundle header parsed"
        );

        let (layout, blocks, assets) = match descriptor.signature {
            Signature::UnityFS => {
                let header = ModernHeader::read(&mut src)?;
                let dir = directory::load(&mut src, &header, options)?;
                (
                    BundleLayout::Modern(DirectoryInfo { header, hash: dir.hash }),
                    dir.blocks,
                    dir.assets,
                )
            }
            Signature::UnityWeb | Signature::UnityRaw => {
                let header = LegacyHeader::read(&mut src, descriptor.format_version)?;
                warn!(
                    signature = %descriptor.signature,
                    name = %header.name,
                    "legacy bundle: asset layout is not decoded, index left empty"
                );
                (BundleLayout::Legacy(header), BlockInfoTable::default(), AssetIndex::default())
            }
        };

        let base_offset = src.tell()?;
        let stream = VirtualBlockStream::new(src.inner, base_offset, Arc::new(blocks))
            .with_endianness(options.asset_endianness);

        Ok(Self {
            descriptor,
            layout,
            assets: Arc::new(assets),
            stream,
            options: options.clone(),
        })
    }

    pub fn descriptor(&self) -> &BundleDescriptor {
        &self.descriptor
    }

    pub fn signature(&self) -> Signature {
        self.descriptor.signature
    }

    pub fn format_version(&self) -> i32 {
        self.descriptor.format_version
    }

    pub fn engine_version(&self) -> &str {
        &self.descriptor.engine_version
    }

    pub fn generator_version(&self) -> &str {
        &self.descriptor.generator_version
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    pub fn blocks(&self) -> &Arc<BlockInfoTable> {
        self.stream.blocks()
    }

    pub fn assets(&self) -> &Arc<AssetIndex> {
        &self.assets
    }

    /// The bundle's own virtual stream.
    pub fn stream(&mut self) -> &mut VirtualBlockStream<S> {
        &mut self.stream
    }

    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            descriptor:  &self.descriptor,
            layout:      &self.layout,
            virtual_len: self.stream.len(),
            blocks:      self.stream.blocks().spans(),
            assets:      &self.assets,
        }
    }

    /// A reader positioned at `record.offset` and bounded to `record.size`.
    ///
    /// The record is used verbatim; it need not come from this bundle's
    /// index.
    pub fn asset_reader(&mut self, record: &AssetRecord) -> Result<AssetReader<'_, S>> {
        AssetReader::new(&mut self.stream, record.offset, record.size, self.options.asset_endianness)
    }

    /// Read the whole of the first asset named `name`.
    pub fn read_asset(&mut self, name: &str) -> Result<Vec<u8>> {
        let record = self
            .assets
            .find(name)
            .cloned()
            .ok_or_else(|| BundleError::AssetNotFound(name.to_owned()))?;
        self.asset_reader(&record)?.read_all()
    }

    /// An independent stream over `source` sharing this bundle's block
    /// table.  `source` must expose the same bytes as the bundle's own.
    pub fn stream_over<T: ByteSource>(&self, source: T) -> VirtualBlockStream<T> {
        VirtualBlockStream::new(source, self.stream.base_offset(), Arc::clone(self.stream.blocks()))
            .with_endianness(self.options.asset_endianness)
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

/// Forces the header endianness onto whatever source the caller supplied.
struct HeaderReader<S: ByteSource> {
    inner:      S,
    endianness: Endianness,
}

impl<S: ByteSource> ByteSource for HeaderReader<S> {
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.inner.read_bytes(n)
    }

    fn tell(&mut self) -> Result<u64> {
        self.inner.tell()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos)
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }
}

// ── AssetReader ──────────────────────────────────────────────────────────────

/// A window of the virtual stream covering one asset.
///
/// Positions are relative to the asset start.  Reads clamp to the asset's
/// declared size and to the end of the virtual stream.
pub struct AssetReader<'a, S: ByteSource> {
    stream:     &'a mut VirtualBlockStream<S>,
    start:      u64,
    size:       u64,
    pos:        u64,
    endianness: Endianness,
}

impl<'a, S: ByteSource> AssetReader<'a, S> {
    pub fn new(
        stream:     &'a mut VirtualBlockStream<S>,
        start:      u64,
        size:       u64,
        endianness: Endianness,
    ) -> Result<Self> {
        stream.seek(SeekFrom::Start(start))?;
        Ok(Self { stream, start, size, pos: 0, endianness })
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Declared asset size.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }

    /// Read from the current position to the end of the asset.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let n = usize::try_from(self.remaining())
            .map_err(|_| BundleError::malformed(format!("asset of {} bytes cannot be buffered", self.size)))?;
        self.read_bytes(n)
    }
}

impl<S: ByteSource> ByteSource for AssetReader<'_, S> {
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let want = usize::try_from(self.remaining()).map_or(n, |r| r.min(n));
        if want == 0 {
            return Ok(Vec::new());
        }
        self.stream.seek(SeekFrom::Start(self.start.saturating_add(self.pos)))?;
        let bytes = self.stream.read_bytes(want)?;
        self.pos += bytes.len() as u64;
        Ok(bytes)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.size)?;
        Ok(self.pos)
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let o = OpenOptions::default();
        assert_eq!(o.header_endianness, Endianness::Big);
        assert_eq!(o.directory_endianness, Endianness::Little);
        assert_eq!(o.max_block_size, DEFAULT_MAX_BLOCK_SIZE);
    }

    #[test]
    fn options_from_partial_json() {
        let o = OpenOptions::from_json(r#"{ "directory_endianness": "big", "max_block_size": 4096 }"#).unwrap();
        assert_eq!(o.directory_endianness, Endianness::Big);
        assert_eq!(o.max_block_size, 4096);
        assert_eq!(o.header_endianness, Endianness::Big);
        assert_eq!(o.asset_endianness, Endianness::Big);
    }

    #[test]
    fn options_builder() {
        let o = OpenOptions::default()
            .asset_endianness(Endianness::Little)
            .header_endianness(Endianness::Little);
        assert_eq!(o.asset_endianness, Endianness::Little);
        assert_eq!(o.header_endianness, Endianness::Little);
    }
}
