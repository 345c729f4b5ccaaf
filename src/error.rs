use std::io;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors raised while opening a bundle or reading from it.
#[derive(Error, Debug)]
pub enum BundleError {
    /// The signature string is not one of the known container variants.
    #[error("Unsupported bundle format: signature {0:?}")]
    UnsupportedFormat(String),
    /// Sizes, counts or tables that cannot describe a valid bundle.
    #[error("Malformed bundle: {0}")]
    Malformed(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A mandatory read ran out of input while parsing headers or tables.
    #[error("Unexpected end of data: wanted {requested} bytes, {available} available")]
    EndOfData { requested: usize, available: usize },
    #[error("Asset not found: {0}")]
    AssetNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BundleError>;

impl BundleError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        BundleError::Malformed(msg.into())
    }
}

impl From<BundleError> for io::Error {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::Io(e) => e,
            BundleError::EndOfData { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionType;

    #[test]
    fn io_errors_pass_through_unchanged() {
        let err = BundleError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn codec_errors_become_invalid_data() {
        let err = BundleError::from(CodecError::Unimplemented(CompressionType::Lzma));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(io_err.to_string().contains("lzma"));
    }

    #[test]
    fn end_of_data_maps_to_unexpected_eof() {
        let err = BundleError::EndOfData { requested: 4, available: 1 };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
