//! Block compression codecs used for the at-rest and on-wire representation
//! of batches. Only the pass-through `NONE` codec lives here.

use std::sync::Arc;

use crc32fast::Hasher;
use thiserror::Error;

/// Method byte written in front of a compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethodByte {
    /// Block stored verbatim.
    None = 0x02,
}

/// Error returned by a [`CompressionCodec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The block length does not match the declared size.
    #[error(
        "Wrong data for compression codec NONE: source_size ({source_size}) != \
         uncompressed_size ({uncompressed_size})"
    )]
    CorruptedData {
        /// Bytes actually present in the block.
        source_size: usize,
        /// Bytes the block header declared.
        uncompressed_size: usize,
    },
    /// The output buffer cannot hold the result.
    #[error("destination buffer holds {capacity} bytes, {required} required")]
    DestinationTooSmall {
        /// Size of the buffer given.
        capacity: usize,
        /// Size the result needs.
        required: usize,
    },
    /// No codec is registered for the method byte.
    #[error("unknown compression method byte {0:#04x}")]
    UnknownMethod(u8),
}

/// A block compression method.
pub trait CompressionCodec: Send + Sync {
    /// Byte identifying the method in a block header.
    fn method_byte(&self) -> u8;

    /// Codec description as written in `CODEC(...)`.
    fn description(&self) -> &str;

    /// Feed the codec identity into a checksum of the column's codec chain.
    fn update_hash(&self, hasher: &mut Hasher) {
        hasher.update(self.description().as_bytes());
    }

    /// Compress `source` into `dest`, returning the number of bytes written.
    fn compress(&self, source: &[u8], dest: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress `source` into `dest`, which receives exactly
    /// `uncompressed_size` bytes.
    fn decompress(
        &self,
        source: &[u8],
        dest: &mut [u8],
        uncompressed_size: usize,
    ) -> Result<(), CodecError>;
}

/// Stores blocks verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneCodec;

impl CompressionCodec for NoneCodec {
    fn method_byte(&self) -> u8 {
        CompressionMethodByte::None as u8
    }

    fn description(&self) -> &str {
        "NONE"
    }

    fn compress(&self, source: &[u8], dest: &mut [u8]) -> Result<usize, CodecError> {
        let capacity = dest.len();
        let dest = dest
            .get_mut(..source.len())
            .ok_or(CodecError::DestinationTooSmall {
                capacity,
                required: source.len(),
            })?;
        dest.copy_from_slice(source);
        Ok(source.len())
    }

    fn decompress(
        &self,
        source: &[u8],
        dest: &mut [u8],
        uncompressed_size: usize,
    ) -> Result<(), CodecError> {
        if source.len() != uncompressed_size {
            return Err(CodecError::CorruptedData {
                source_size: source.len(),
                uncompressed_size,
            });
        }
        let capacity = dest.len();
        let dest = dest
            .get_mut(..uncompressed_size)
            .ok_or(CodecError::DestinationTooSmall {
                capacity,
                required: uncompressed_size,
            })?;
        dest.copy_from_slice(source);
        Ok(())
    }
}

/// Look up a codec by the method byte read from a block header.
pub fn codec_for_method(method: u8) -> Result<Arc<dyn CompressionCodec>, CodecError> {
    match method {
        m if m == CompressionMethodByte::None as u8 => Ok(Arc::new(NoneCodec)),
        other => Err(CodecError::UnknownMethod(other)),
    }
}

/// Look up a codec by its `CODEC(...)` name.
pub fn codec_by_name(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    name.eq_ignore_ascii_case("NONE")
        .then(|| Arc::new(NoneCodec) as Arc<dyn CompressionCodec>)
}
