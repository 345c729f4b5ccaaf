use serde::Serialize;

use crate::byte_source::ByteSource;
use crate::error::{BundleError, Result};

/// Status bit marking an entry as a serialized asset file rather than a raw
/// resource blob.
pub const STATUS_SERIALIZED_FILE: u32 = 0x4;

/// Location of one asset inside the virtual stream.
///
/// Offsets and sizes are taken verbatim from the directory; records may be
/// unsorted and may overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub name:   String,
    pub offset: u64,
    pub size:   u64,
    pub status: u32,
}

impl AssetRecord {
    /// Read one `{ i64 offset, i64 size, u32 status, cstring name }` record.
    pub fn read<S: ByteSource>(src: &mut S) -> Result<Self> {
        let offset = src.read_i64()?;
        let size   = src.read_i64()?;
        let status = src.read_u32()?;
        let name   = src.read_cstring()?;
        if offset < 0 || size < 0 {
            return Err(BundleError::malformed(format!(
                "asset {name:?} has negative offset {offset} or size {size}"
            )));
        }
        Ok(Self { name, offset: offset as u64, size: size as u64, status })
    }

    /// One past the last virtual byte of the asset.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    pub fn is_serialized_file(&self) -> bool {
        self.status & STATUS_SERIALIZED_FILE != 0
    }
}

/// Ordered asset records, as listed in the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetIndex {
    records: Vec<AssetRecord>,
}

impl AssetIndex {
    pub fn new(records: Vec<AssetRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AssetRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssetRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    /// First record named `name`.  Names are not required to be unique.
    pub fn find(&self, name: &str) -> Option<&AssetRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

impl<'a> IntoIterator for &'a AssetIndex {
    type Item     = &'a AssetRecord;
    type IntoIter = std::slice::Iter<'a, AssetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::{Endianness, SliceSource};

    fn record_bytes(offset: i64, size: i64, status: u32, name: &str) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&offset.to_le_bytes());
        v.extend_from_slice(&size.to_le_bytes());
        v.extend_from_slice(&status.to_le_bytes());
        v.extend_from_slice(name.as_bytes());
        v.push(0);
        v
    }

    #[test]
    fn reads_record() {
        let mut src = SliceSource::new(record_bytes(64, 128, 4, "CAB-0001"))
            .with_endianness(Endianness::Little);
        let r = AssetRecord::read(&mut src).unwrap();
        assert_eq!(r.name, "CAB-0001");
        assert_eq!((r.offset, r.size, r.end()), (64, 128, 192));
        assert!(r.is_serialized_file());
    }

    #[test]
    fn negative_size_is_malformed() {
        let mut src = SliceSource::new(record_bytes(0, -5, 0, "bad"))
            .with_endianness(Endianness::Little);
        assert!(matches!(AssetRecord::read(&mut src), Err(BundleError::Malformed(_))));
    }

    #[test]
    fn overlapping_and_unsorted_records_are_kept_in_order() {
        let idx = AssetIndex::new(vec![
            AssetRecord { name: "b".into(), offset: 50, size: 100, status: 0 },
            AssetRecord { name: "a".into(), offset: 0,  size: 80,  status: 0 },
            AssetRecord { name: "b".into(), offset: 10, size: 1,   status: 0 },
        ]);
        let names: Vec<_> = idx.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "b"]);
        assert_eq!(idx.find("b").unwrap().offset, 50);
        assert!(idx.find("c").is_none());
    }
}
