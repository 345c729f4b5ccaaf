//! Random-access decompressed view over a bundle's block storage.
//!
//! # Model
//! The virtual stream is the concatenation of every block's decompressed
//! bytes, in table order.  Physically the blocks sit back to back starting at
//! `base_offset` in the underlying source.  Nothing is decompressed up front:
//! a block is read and decoded the first time the cursor enters it, and it
//! stays cached until the cursor leaves it.  At most one decoded block is
//! held at a time.
//!
//! # Reads
//! `read_bytes(n)` near the end of the stream returns fewer than `n` bytes
//! instead of failing, and returns nothing at or past the end.  Reads that
//! span blocks transparently decode each block in turn.  Wrap the stream
//! with [`ByteSource::into_io`] to hand it to `std::io` consumers.
//!
//! # Failures
//! A codec or I/O failure while entering a block is returned to the caller.
//! The cursor does not move and the cache is left empty, so a later read in
//! the same block fails the same way until a seek lands somewhere decodable.

use std::io::SeekFrom;
use std::sync::Arc;

use tracing::trace;

use crate::block::BlockInfoTable;
use crate::byte_source::{resolve_seek, ByteSource, Endianness};
use crate::codec;
use crate::error::Result;

/// The single cached block.
#[derive(Debug)]
struct DecodedBlock {
    index: usize,
    /// Virtual offset of the block's first byte.
    start: u64,
    data:  Vec<u8>,
}

impl DecodedBlock {
    fn contains(&self, pos: u64) -> bool {
        pos >= self.start && pos - self.start < self.data.len() as u64
    }
}

#[derive(Debug)]
pub struct VirtualBlockStream<S: ByteSource> {
    source:      S,
    base_offset: u64,
    blocks:      Arc<BlockInfoTable>,
    cursor:      u64,
    cache:       Option<DecodedBlock>,
    endianness:  Endianness,
}

impl<S: ByteSource> VirtualBlockStream<S> {
    /// Wrap `source`, whose block region starts at `base_offset`.
    pub fn new(source: S, base_offset: u64, blocks: Arc<BlockInfoTable>) -> Self {
        Self {
            source,
            base_offset,
            blocks,
            cursor:     0,
            cache:      None,
            endianness: Endianness::Big,
        }
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Total virtual length.
    pub fn len(&self) -> u64 {
        self.blocks.total_uncompressed()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.cursor
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn blocks(&self) -> &Arc<BlockInfoTable> {
        &self.blocks
    }

    /// Index of the block currently held decoded, if any.
    pub fn cached_block(&self) -> Option<usize> {
        self.cache.as_ref().map(|c| c.index)
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Ensure the block containing `pos` is the cached one.  Returns `false`
    /// when no block contains `pos` (at or past the end).
    fn load_block_at(&mut self, pos: u64) -> Result<bool> {
        if self.cache.as_ref().is_some_and(|c| c.contains(pos)) {
            return Ok(true);
        }
        let Some(index) = self.blocks.block_for_offset(pos) else {
            return Ok(false);
        };
        let (Some(&span), Some(physical), Some(start)) = (
            self.blocks.get(index),
            self.blocks.compressed_start(index),
            self.blocks.uncompressed_start(index),
        ) else {
            return Ok(false);
        };

        self.cache = None;
        self.source.seek(SeekFrom::Start(self.base_offset + physical))?;
        let compressed = self.source.read_bytes(span.compressed_size as usize)?;
        let data = codec::decode(
            span.codec_id(),
            &compressed,
            span.compressed_size as usize,
            span.uncompressed_size as usize,
        )?;
        trace!(
            block = index,
            codec = span.codec_id(),
            compressed = span.compressed_size,
            uncompressed = span.uncompressed_size,
            "block decoded"
        );
        self.cache = Some(DecodedBlock { index, start, data });
        Ok(true)
    }
}

impl<S: ByteSource> ByteSource for VirtualBlockStream<S> {
    /// Short reads at the end of the stream are not errors.
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let available = self.len().saturating_sub(self.cursor);
        let want = usize::try_from(available).map_or(n, |a| a.min(n));
        // Grown only by decoded bytes: declared lengths are untrusted.
        let mut out = Vec::new();
        let mut pos = self.cursor;

        while out.len() < want {
            if !self.load_block_at(pos)? {
                break;
            }
            let Some(block) = self.cache.as_ref() else { break };
            let intra = (pos - block.start) as usize;
            let take  = (want - out.len()).min(block.data.len() - intra);
            out.extend_from_slice(&block.data[intra..intra + take]);
            pos += take as u64;
        }

        self.cursor = pos;
        Ok(out)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.cursor)
    }

    /// Inside the cached block this only moves the cursor.  Anywhere else
    /// inside the stream the target block is decoded immediately; past the
    /// end the cursor simply moves.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.cursor, self.len())?;
        self.load_block_at(target)?;
        self.cursor = target;
        Ok(target)
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }
}
