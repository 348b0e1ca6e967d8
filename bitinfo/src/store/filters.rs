//! Chunk payload filters: byte shuffle and zlib

use crate::encoding::VariableEncoding;
use bitinfo_core::format::constants::filters;
use bitinfo_core::{ChunkIndexEntry, Compression};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Why a stored payload could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// zlib stream is invalid
    Decompress(String),
    /// Decoded size differs from the chunk index
    SizeMismatch { expected: usize, actual: usize },
    /// Raw size is not a multiple of the element size
    Misaligned,
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::Decompress(msg) => write!(f, "zlib: {msg}"),
            FilterError::SizeMismatch { expected, actual } => {
                write!(f, "decoded {actual} bytes, expected {expected}")
            }
            FilterError::Misaligned => write!(f, "size is not a multiple of the element size"),
        }
    }
}

/// Group byte `k` of every element together
///
/// Trailing bytes that do not form a whole element are copied unchanged.
pub fn shuffle(data: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for (i, elem) in data[..n * elem_size].chunks_exact(elem_size).enumerate() {
        for (k, &byte) in elem.iter().enumerate() {
            out[k * n + i] = byte;
        }
    }
    out[n * elem_size..].copy_from_slice(&data[n * elem_size..]);
    out
}

/// Inverse of [`shuffle`]
pub fn unshuffle(data: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for (i, elem) in out[..n * elem_size].chunks_exact_mut(elem_size).enumerate() {
        for (k, byte) in elem.iter_mut().enumerate() {
            *byte = data[k * n + i];
        }
    }
    out[n * elem_size..].copy_from_slice(&data[n * elem_size..]);
    out
}

/// zlib stream of `data` at `level` (0-9)
pub fn zlib_compress(data: &[u8], level: u8) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2),
        flate2::Compression::new(level as u32),
    );
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a zlib stream of known decoded size
pub fn zlib_decompress(data: &[u8], expected: usize) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::new();
    // read one byte past the expected size to detect oversized streams
    ZlibDecoder::new(data)
        .take((expected as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| FilterError::Decompress(e.to_string()))?;
    if out.len() != expected {
        return Err(FilterError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Apply the encoding's filters to a raw chunk
///
/// Returns the stored payload and its filter mask.
pub fn encode_chunk(
    raw: &[u8],
    elem_size: usize,
    encoding: &VariableEncoding,
) -> std::io::Result<(Vec<u8>, u32)> {
    let mut mask = 0;
    let mut payload = if encoding.shuffle {
        mask |= filters::SHUFFLE;
        shuffle(raw, elem_size)
    } else {
        raw.to_vec()
    };
    if encoding.compression == Compression::Zlib {
        mask |= filters::ZLIB;
        payload = zlib_compress(&payload, encoding.complevel)?;
    }
    Ok((payload, mask))
}

/// Undo the filters recorded in `entry`
pub fn decode_chunk(
    stored: &[u8],
    entry: &ChunkIndexEntry,
    elem_size: usize,
) -> Result<Vec<u8>, FilterError> {
    let expected = entry.raw_size as usize;
    if expected % elem_size != 0 {
        return Err(FilterError::Misaligned);
    }
    let payload = if entry.has_filter(filters::ZLIB) {
        zlib_decompress(stored, expected)?
    } else if stored.len() != expected {
        return Err(FilterError::SizeMismatch {
            expected,
            actual: stored.len(),
        });
    } else {
        stored.to_vec()
    };
    if entry.has_filter(filters::SHUFFLE) {
        Ok(unshuffle(&payload, elem_size))
    } else {
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_layout() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let shuffled = shuffle(&data, 4);
        assert_eq!(shuffled, vec![1, 5, 2, 6, 3, 7, 4, 8, 9]);
        assert_eq!(unshuffle(&shuffled, 4), data.to_vec());
    }

    #[test]
    fn test_zlib_sizes() {
        let data = vec![42u8; 4096];
        let packed = zlib_compress(&data, 9).unwrap();
        assert!(packed.len() < 100);
        assert_eq!(zlib_decompress(&packed, 4096).unwrap(), data);
        assert_eq!(
            zlib_decompress(&packed, 4000),
            Err(FilterError::SizeMismatch {
                expected: 4000,
                actual: 4001
            })
        );
        // the declared size does not drive the allocation
        assert_eq!(
            zlib_decompress(&packed, usize::MAX),
            Err(FilterError::SizeMismatch {
                expected: usize::MAX,
                actual: 4096
            })
        );
        assert!(matches!(
            zlib_decompress(&[1, 2, 3], 10),
            Err(FilterError::Decompress(_))
        ));
    }

    #[test]
    fn test_chunk_filters_roundtrip() {
        let raw: Vec<u8> = (0..64u32).flat_map(|v| (v * 3).to_le_bytes()).collect();
        let encoding = VariableEncoding {
            compression: Compression::Zlib,
            shuffle: true,
            complevel: 6,
            chunksizes: vec![64],
        };
        let (payload, mask) = encode_chunk(&raw, 4, &encoding).unwrap();
        assert_eq!(mask, filters::SHUFFLE | filters::ZLIB);
        let entry = ChunkIndexEntry::new(0, payload.len() as u64, raw.len() as u64, mask);
        assert_eq!(decode_chunk(&payload, &entry, 4).unwrap(), raw);

        let plain = ChunkIndexEntry::new(0, 8, 8, 0);
        assert!(decode_chunk(&raw[..8], &plain, 4).is_ok());
        assert!(decode_chunk(&raw[..7], &plain, 4).is_err());
    }
}
