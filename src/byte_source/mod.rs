//! Endian-aware byte sources.
//!
//! [`ByteSource`] is the one capability every parser in this crate reads
//! through: `read_bytes`, `tell` and `seek`, plus scalar and string helpers
//! layered on top.  Two variants implement it independently:
//!
//! | Variant          | Backing            | `read_bytes(n)` with fewer than `n` left |
//! |------------------|--------------------|------------------------------------------|
//! | [`StreamSource`] | any `Read + Seek`  | fails with `EndOfData`                   |
//! | [`SliceSource`]  | owned `Vec<u8>`    | returns the bytes that remain            |
//!
//! Scalar helpers always require their full width, whatever the variant.
//!
//! # Endianness
//! Sources default to big-endian, the on-disk convention for bundle headers.
//! Directory payloads are read through a little-endian [`SliceSource`].

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

// ── Endianness ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

impl Endianness {
    #[inline]
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Big    => BigEndian::read_u16(buf),
            Endianness::Little => LittleEndian::read_u16(buf),
        }
    }

    #[inline]
    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Big    => BigEndian::read_u32(buf),
            Endianness::Little => LittleEndian::read_u32(buf),
        }
    }

    #[inline]
    fn u64(self, buf: &[u8]) -> u64 {
        match self {
            Endianness::Big    => BigEndian::read_u64(buf),
            Endianness::Little => LittleEndian::read_u64(buf),
        }
    }
}

// ── Capability trait ─────────────────────────────────────────────────────────

pub trait ByteSource {
    /// Read up to `n` bytes.  Whether fewer than `n` is an error depends on
    /// the implementation; see the module docs.
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>>;

    fn tell(&mut self) -> Result<u64>;

    /// Reposition; returns the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    fn endianness(&self) -> Endianness;

    /// Read exactly `N` bytes or fail with `EndOfData`.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]>
    where
        Self: Sized,
    {
        let bytes = self.read_bytes(N)?;
        let available = bytes.len();
        bytes
            .try_into()
            .map_err(|_| BundleError::EndOfData { requested: N, available })
    }

    fn read_u8(&mut self) -> Result<u8>
    where
        Self: Sized,
    {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16>
    where
        Self: Sized,
    {
        let buf = self.read_array::<2>()?;
        Ok(self.endianness().u16(&buf))
    }

    fn read_i16(&mut self) -> Result<i16>
    where
        Self: Sized,
    {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32>
    where
        Self: Sized,
    {
        let buf = self.read_array::<4>()?;
        Ok(self.endianness().u32(&buf))
    }

    fn read_i32(&mut self) -> Result<i32>
    where
        Self: Sized,
    {
        Ok(self.read_u32()? as i32)
    }

    fn read_u64(&mut self) -> Result<u64>
    where
        Self: Sized,
    {
        let buf = self.read_array::<8>()?;
        Ok(self.endianness().u64(&buf))
    }

    fn read_i64(&mut self) -> Result<i64>
    where
        Self: Sized,
    {
        Ok(self.read_u64()? as i64)
    }

    /// Bytes up to (not including) a NUL terminator, or to end of data.
    /// Invalid UTF-8 is replaced, never rejected.
    fn read_cstring(&mut self) -> Result<String>
    where
        Self: Sized,
    {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8() {
                Ok(0) => break,
                Ok(c) => bytes.push(c),
                Err(BundleError::EndOfData { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// A string stored in exactly `n` bytes.
    fn read_fixed_string(&mut self, n: usize) -> Result<String>
    where
        Self: Sized,
    {
        let bytes = self.read_bytes(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Adapt to `std::io::Read + Seek`.
    fn into_io(self) -> IoAdapter<Self>
    where
        Self: Sized,
    {
        IoAdapter(self)
    }
}

impl<B: ByteSource + ?Sized> ByteSource for &mut B {
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(n)
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn endianness(&self) -> Endianness {
        (**self).endianness()
    }
}

// ── std::io adapter ──────────────────────────────────────────────────────────

/// `std::io::Read + Seek` view of a [`ByteSource`].
///
/// Errors are converted with `From<BundleError> for io::Error`.
pub struct IoAdapter<B: ByteSource>(pub B);

impl<B: ByteSource> IoAdapter<B> {
    pub fn into_inner(self) -> B {
        self.0
    }
}

impl<B: ByteSource> Read for IoAdapter<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self.0.read_bytes(buf.len())?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}

impl<B: ByteSource> Seek for IoAdapter<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.0.seek(pos)?)
    }
}

/// Resolve a `SeekFrom` against a current position and a length.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> Result<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(p)   => return Ok(p),
        SeekFrom::Current(d) => (current, d),
        SeekFrom::End(d)     => (len, d),
    };
    base.checked_add_signed(delta).ok_or_else(|| {
        BundleError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("seek to {base} {delta:+} is out of range"),
        ))
    })
}

// ── Stream-backed variant ────────────────────────────────────────────────────

/// Up-front buffer reservation cap for stream reads; larger reads grow as
/// bytes arrive.
const STREAM_PREALLOC_LIMIT: usize = 64 * 1024;

/// A [`ByteSource`] over a `Read + Seek` stream.  Short reads are errors.
pub struct StreamSource<R: Read + Seek> {
    inner:      R,
    endianness: Endianness,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, endianness: Endianness::Big }
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(STREAM_PREALLOC_LIMIT));
        let got = (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        if got < n {
            return Err(BundleError::EndOfData { requested: n, available: got });
        }
        Ok(buf)
    }

    /// Byte-at-a-time scan straight off the inner reader.
    fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == 0 => break,
                Ok(_) => bytes.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let current = self.inner.stream_position()?;
        let target = match pos {
            SeekFrom::End(_) => return Ok(self.inner.seek(pos)?),
            _ => resolve_seek(pos, current, 0)?,
        };
        if target == current {
            return Ok(current);
        }
        Ok(self.inner.seek(SeekFrom::Start(target))?)
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }
}

// ── Buffer-backed variant ────────────────────────────────────────────────────

/// A [`ByteSource`] over an owned buffer.  Reads clamp to what remains.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data:       Vec<u8>,
    pos:        u64,
    endianness: Endianness,
}

impl SliceSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into(), pos: 0, endianness: Endianness::Big }
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self) -> usize {
        usize::try_from(self.pos).unwrap_or(usize::MAX)
    }
}

impl ByteSource for SliceSource {
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let start = self.offset().min(self.data.len());
        let end   = start.saturating_add(n).min(self.data.len());
        self.pos += (end - start) as u64;
        Ok(self.data[start..end].to_vec())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.data.len() as u64)?;
        Ok(self.pos)
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn read_cstring(&mut self) -> Result<String> {
        let start = self.offset().min(self.data.len());
        let rest  = &self.data[start..];
        let (text, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(nul) => (&rest[..nul], nul + 1),
            None      => (rest, rest.len()),
        };
        let s = String::from_utf8_lossy(text).into_owned();
        self.pos += consumed as u64;
        Ok(s)
    }
}
