pub mod error;
pub mod byte_source;
pub mod codec;
pub mod header;
pub mod block;
pub mod index;
pub mod directory;
pub mod virtual_stream;
pub mod bundle;

pub use error::{BundleError, Result};
pub use byte_source::{ByteSource, Endianness, SliceSource, StreamSource};
pub use codec::{CodecError, CompressionType, decode};
pub use header::{BundleDescriptor, LegacyHeader, ModernHeader, Signature};
pub use block::{BlockInfoTable, CompressedBlockSpan};
pub use index::{AssetIndex, AssetRecord};
pub use directory::DirectoryInfo;
pub use virtual_stream::VirtualBlockStream;
pub use bundle::{AssetReader, Bundle, BundleLayout, Manifest, OpenOptions};
