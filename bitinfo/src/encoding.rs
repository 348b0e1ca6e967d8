//! Compression encodings for writing datasets

use crate::dataset::{Dataset, Variable};
use crate::error::{Error, Result};
use bitinfo_core::format::constants::MAX_COMPLEVEL;
use bitinfo_core::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for [`get_compress_encoding`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOptions {
    /// Compression codec
    pub compression: Compression,
    /// Byte shuffle before compression
    pub shuffle: bool,
    /// zlib level, 0 to 9
    pub complevel: u8,
    /// Chunk one step along `time_dim` so tools reading timestep-wise stay fast
    pub for_cdo: bool,
    /// Name of the time dimension used by `for_cdo`
    pub time_dim: String,
    /// Explicit chunk lengths per dimension name
    pub chunksizes: Option<BTreeMap<String, usize>>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Zlib,
            shuffle: true,
            complevel: 9,
            for_cdo: false,
            time_dim: "time".to_string(),
            chunksizes: None,
        }
    }
}

impl CompressOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_complevel(mut self, complevel: u8) -> Self {
        self.complevel = complevel;
        self
    }

    pub fn with_for_cdo(mut self, for_cdo: bool) -> Self {
        self.for_cdo = for_cdo;
        self
    }

    pub fn with_time_dim(mut self, time_dim: impl Into<String>) -> Self {
        self.time_dim = time_dim.into();
        self
    }

    /// Set the chunk length of one dimension
    pub fn with_chunksize(mut self, dim: impl Into<String>, len: usize) -> Self {
        self.chunksizes
            .get_or_insert_with(BTreeMap::new)
            .insert(dim.into(), len);
        self
    }

    /// Options that store data as-is
    pub fn uncompressed() -> Self {
        Self::default()
            .with_compression(Compression::None)
            .with_shuffle(false)
    }

    pub fn validate(&self) -> Result<()> {
        if self.complevel > MAX_COMPLEVEL {
            return Err(Error::InvalidParameter(format!(
                "complevel {} above {MAX_COMPLEVEL}",
                self.complevel
            )));
        }
        if let Some(chunks) = &self.chunksizes {
            if let Some((dim, _)) = chunks.iter().find(|(_, &len)| len == 0) {
                return Err(Error::InvalidParameter(format!(
                    "chunk length of `{dim}` must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Storage settings of one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableEncoding {
    pub compression: Compression,
    pub shuffle: bool,
    pub complevel: u8,
    /// Chunk length per axis, same order as the variable's dims
    pub chunksizes: Vec<usize>,
}

impl VariableEncoding {
    /// One chunk spanning the whole variable, no filters
    pub fn raw(var: &Variable) -> Self {
        Self {
            compression: Compression::None,
            shuffle: false,
            complevel: 0,
            chunksizes: full_chunks(var),
        }
    }
}

// zero-length axes still need a positive chunk length
fn full_chunks(var: &Variable) -> Vec<usize> {
    var.shape().iter().map(|&len| len.max(1)).collect()
}

/// Encoding of one variable under `options`
pub fn variable_encoding(var: &Variable, options: &CompressOptions) -> VariableEncoding {
    let mut chunksizes = full_chunks(var);
    for (axis, dim) in var.dims().iter().enumerate() {
        if options.for_cdo {
            if *dim == options.time_dim {
                chunksizes[axis] = 1;
            }
        } else if let Some(len) = options.chunksizes.as_ref().and_then(|c| c.get(dim)) {
            chunksizes[axis] = (*len).min(chunksizes[axis]);
        }
    }
    VariableEncoding {
        compression: options.compression,
        shuffle: options.shuffle,
        complevel: options.complevel,
        chunksizes,
    }
}

/// Encoding for every data variable of `ds`
pub fn get_compress_encoding(
    ds: &Dataset,
    options: &CompressOptions,
) -> Result<BTreeMap<String, VariableEncoding>> {
    options.validate()?;
    Ok(ds
        .data_vars()
        .iter()
        .map(|var| (var.name().to_string(), variable_encoding(var, options)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::new()
            .with_data_var(
                Variable::from_vec("air", &["time", "lat", "lon"], &[5, 4, 6], vec![0.0f32; 120])
                    .unwrap(),
            )
            .unwrap()
            .with_data_var(Variable::from_vec("mask", &["lat"], &[4], vec![1u32; 4]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_defaults_use_full_shape() {
        let enc = get_compress_encoding(&dataset(), &CompressOptions::default()).unwrap();
        assert_eq!(enc.len(), 2);
        let air = &enc["air"];
        assert_eq!(air.chunksizes, vec![5, 4, 6]);
        assert_eq!(air.compression, Compression::Zlib);
        assert!(air.shuffle);
        assert_eq!(air.complevel, 9);
    }

    #[test]
    fn test_for_cdo_chunks_time() {
        let options = CompressOptions::default()
            .with_for_cdo(true)
            .with_chunksize("lon", 2);
        let enc = get_compress_encoding(&dataset(), &options).unwrap();
        assert_eq!(enc["air"].chunksizes, vec![1, 4, 6]);
        assert_eq!(enc["mask"].chunksizes, vec![4]);
    }

    #[test]
    fn test_explicit_chunks_are_clamped() {
        let options = CompressOptions::default()
            .with_chunksize("lon", 2)
            .with_chunksize("lat", 100);
        let enc = get_compress_encoding(&dataset(), &options).unwrap();
        assert_eq!(enc["air"].chunksizes, vec![5, 4, 2]);
    }

    #[test]
    fn test_invalid_options() {
        assert!(get_compress_encoding(&dataset(), &CompressOptions::default().with_complevel(10))
            .is_err());
        assert!(
            get_compress_encoding(&dataset(), &CompressOptions::default().with_chunksize("lat", 0))
                .is_err()
        );
    }
}
