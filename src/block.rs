use serde::Serialize;

use crate::byte_source::ByteSource;
use crate::codec::{CodecError, CompressionType};
use crate::error::{BundleError, Result};

/// One independently compressed range of the asset-data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressedBlockSpan {
    pub uncompressed_size: u32,
    pub compressed_size:   u32,
    /// Raw block flags; the low 6 bits are the codec id.
    pub flags:             u16,
}

impl CompressedBlockSpan {
    /// Read one `{ i32 uSize, i32 cSize, u16 flags }` descriptor.
    pub fn read<S: ByteSource>(src: &mut S) -> Result<Self> {
        let uncompressed_size = src.read_i32()?;
        let compressed_size   = src.read_i32()?;
        let flags             = src.read_u16()?;
        if uncompressed_size < 0 || compressed_size < 0 {
            return Err(BundleError::malformed(format!(
                "negative block size (uncompressed {uncompressed_size}, compressed {compressed_size})"
            )));
        }
        Ok(Self {
            uncompressed_size: uncompressed_size as u32,
            compressed_size:   compressed_size as u32,
            flags,
        })
    }

    pub fn codec_id(&self) -> u32 {
        u32::from(self.flags) & crate::codec::CODEC_MASK
    }

    pub fn compression(&self) -> std::result::Result<CompressionType, CodecError> {
        CompressionType::from_flags(u32::from(self.flags))
    }
}

/// Ordered physical layout of the asset-data region.
///
/// Spans are contiguous and in order.  Prefix sums are kept for both size
/// columns so a block's virtual and physical start are O(1) lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfoTable {
    spans:               Vec<CompressedBlockSpan>,
    /// `spans.len() + 1` entries; `uncompressed_starts[i]` is block `i`'s
    /// virtual offset, the last entry the total virtual length.
    uncompressed_starts: Vec<u64>,
    compressed_starts:   Vec<u64>,
}

impl BlockInfoTable {
    pub fn new(spans: Vec<CompressedBlockSpan>) -> Self {
        let mut uncompressed_starts = Vec::with_capacity(spans.len() + 1);
        let mut compressed_starts   = Vec::with_capacity(spans.len() + 1);
        let (mut u, mut c) = (0u64, 0u64);
        uncompressed_starts.push(u);
        compressed_starts.push(c);
        for span in &spans {
            u += u64::from(span.uncompressed_size);
            c += u64::from(span.compressed_size);
            uncompressed_starts.push(u);
            compressed_starts.push(c);
        }
        Self { spans, uncompressed_starts, compressed_starts }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[CompressedBlockSpan] {
        &self.spans
    }

    pub fn get(&self, index: usize) -> Option<&CompressedBlockSpan> {
        self.spans.get(index)
    }

    /// Length of the virtual (decompressed) stream.
    pub fn total_uncompressed(&self) -> u64 {
        self.uncompressed_starts.last().copied().unwrap_or(0)
    }

    /// Length of the physical (compressed) region.
    pub fn total_compressed(&self) -> u64 {
        self.compressed_starts.last().copied().unwrap_or(0)
    }

    /// Virtual offset of block `index`; `index == len()` gives the total.
    /// `None` past that.
    pub fn uncompressed_start(&self, index: usize) -> Option<u64> {
        self.uncompressed_starts.get(index).copied()
    }

    /// Offset of block `index` within the physical region.
    pub fn compressed_start(&self, index: usize) -> Option<u64> {
        self.compressed_starts.get(index).copied()
    }

    /// The block containing virtual offset `pos`: the first block whose end
    /// is strictly greater than `pos`.  An offset on a block boundary belongs
    /// to the following block, and empty blocks never contain anything.
    pub fn block_for_offset(&self, pos: u64) -> Option<usize> {
        if pos >= self.total_uncompressed() {
            return None;
        }
        // Ends are non-decreasing, so the predicate is monotone.
        let ends = &self.uncompressed_starts[1..];
        Some(ends.partition_point(|&end| end <= pos))
    }
}

impl Default for BlockInfoTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::{Endianness, SliceSource};

    fn span(u: u32, c: u32) -> CompressedBlockSpan {
        CompressedBlockSpan { uncompressed_size: u, compressed_size: c, flags: 0 }
    }

    #[test]
    fn prefix_sums() {
        let t = BlockInfoTable::new(vec![span(100, 100), span(200, 80), span(50, 60)]);
        assert_eq!(t.total_uncompressed(), 350);
        assert_eq!(t.total_compressed(), 240);
        assert_eq!(t.uncompressed_start(2), Some(300));
        assert_eq!(t.compressed_start(2), Some(180));
        assert_eq!(t.uncompressed_start(3), Some(350));
        assert_eq!(t.compressed_start(3), Some(240));
    }

    #[test]
    fn starts_out_of_range_are_none() {
        let t = BlockInfoTable::new(vec![span(10, 10)]);
        assert_eq!(t.uncompressed_start(2), None);
        assert_eq!(t.compressed_start(usize::MAX), None);
        assert_eq!(BlockInfoTable::default().uncompressed_start(0), Some(0));
    }

    #[test]
    fn boundaries_resolve_to_following_block() {
        let t = BlockInfoTable::new(vec![span(100, 100), span(200, 80)]);
        assert_eq!(t.block_for_offset(0), Some(0));
        assert_eq!(t.block_for_offset(99), Some(0));
        assert_eq!(t.block_for_offset(100), Some(1));
        assert_eq!(t.block_for_offset(299), Some(1));
        assert_eq!(t.block_for_offset(300), None);
    }

    #[test]
    fn empty_blocks_are_skipped() {
        let t = BlockInfoTable::new(vec![span(0, 0), span(10, 10), span(0, 4), span(5, 5)]);
        assert_eq!(t.block_for_offset(0), Some(1));
        assert_eq!(t.block_for_offset(10), Some(3));
    }

    #[test]
    fn empty_table_is_zero_length() {
        let t = BlockInfoTable::default();
        assert_eq!(t.total_uncompressed(), 0);
        assert_eq!(t.block_for_offset(0), None);
    }

    #[test]
    fn span_read_rejects_negative_sizes() {
        let mut bytes = (-1i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let mut src = SliceSource::new(bytes).with_endianness(Endianness::Little);
        assert!(matches!(CompressedBlockSpan::read(&mut src), Err(BundleError::Malformed(_))));
    }

    #[test]
    fn span_codec_ignores_high_bits() {
        let s = CompressedBlockSpan { uncompressed_size: 1, compressed_size: 1, flags: 0x0042 };
        assert_eq!(s.codec_id(), 2);
        assert_eq!(s.compression().unwrap(), CompressionType::Lz4);
    }
}
