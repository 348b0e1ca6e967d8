//! BITC container: chunked, filtered storage of datasets
//!
//! Files are opened through a [`StorageBackend`], by default a read-only
//! memory map. Opening validates the header, metadata and every chunk
//! index entry; payloads are only decoded when a variable is read.

pub mod backend;
pub mod file_io;
pub mod filters;
pub(crate) mod layout;

pub use backend::{FileBackend, OwnedBackend};
#[cfg(feature = "mmap")]
pub use backend::MmapBackend;
pub use file_io::{to_compressed, to_uncompressed, write_dataset, WriteSummary};

use crate::dataset::{ArrayData, Dataset, Variable};
use crate::error::{Error, Result};
use crate::metadata::{DatasetMetadata, MetadataView, VariableMetadata, VariableRole};
use bitinfo_core::format::constants::{filters as filter_bits, flags, ALIGNMENT_BOUNDARY};
use bitinfo_core::{
    BitcHeader, BitinfoError, ChunkIndexEntry, ChunkProcessor, DataType, StorageBackend,
};
use layout::ChunkLayout;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// An opened .bitc file
#[derive(Debug)]
pub struct BitcFile<B: StorageBackend = FileBackend> {
    backend: B,
    header: BitcHeader,
    view: MetadataView,
    index: Vec<ChunkIndexEntry>,
    path: Option<PathBuf>,
}

impl BitcFile<FileBackend> {
    /// Open and validate a file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let backend = FileBackend::open(path)?;
        let mut file = Self::from_backend(backend)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }
}

impl<B: StorageBackend + Sync> BitcFile<B> {
    /// Validate a file held by any backend
    pub fn from_backend(backend: B) -> Result<Self> {
        let bytes = backend.as_slice();
        let header = BitcHeader::from_bytes(bytes)?;
        if !header.is_valid() {
            return Err(BitinfoError::InvalidHeader.into());
        }
        header.validate_regions(bytes.len() as u64)?;
        bitinfo_core::validation::format::validate_offset_alignment(
            header.data_offset as usize,
            ALIGNMENT_BOUNDARY,
        )?;

        let (meta_offset, meta_size) = header
            .metadata_region()
            .ok_or(BitinfoError::CorruptedData)?;
        let meta_bytes = &bytes[meta_offset as usize..(meta_offset + meta_size) as usize];
        let metadata = DatasetMetadata::from_bytes(meta_bytes)?;
        if metadata.variables.len() != header.variable_count as usize {
            return Err(BitinfoError::InvalidHeader.into());
        }
        metadata.validate(header.index_count)?;

        let index_start = header.index_offset as usize;
        let index = (0..header.index_count as usize)
            .map(|i| {
                let at = index_start + i * ChunkIndexEntry::SIZE;
                let entry = ChunkIndexEntry::from_bytes(&bytes[at..at + ChunkIndexEntry::SIZE])?;
                entry.payload_range(header.data_size)?;
                Ok::<_, Error>(entry)
            })
            .collect::<Result<Vec<_>>>()?;

        // every entry must decode to exactly its chunk of the grid
        for var in &metadata.variables {
            let layout = ChunkLayout::new(&var.shape, &var.encoding.chunksizes)?;
            let elem = var.data_type.size_bytes() as u64;
            let first = var.first_chunk as usize;
            for (chunk, entry) in index[first..first + var.chunk_count as usize].iter().enumerate() {
                let expected = layout.chunk_len(chunk) as u64 * elem;
                if entry.raw_size != expected {
                    return Err(Error::CorruptedChunk {
                        name: var.name.clone(),
                        chunk,
                        reason: format!("entry holds {} bytes, expected {expected}", entry.raw_size),
                    });
                }
                if (entry.has_filter(filter_bits::ZLIB) && !header.has_flag(flags::COMPRESSED))
                    || (entry.has_filter(filter_bits::SHUFFLE) && !header.has_flag(flags::SHUFFLED))
                {
                    return Err(BitinfoError::InvalidHeader.into());
                }
            }
        }

        let view = MetadataView::new(metadata)?;
        Ok(Self {
            backend,
            header,
            view,
            index,
            path: None,
        })
    }

    pub fn header(&self) -> &BitcHeader {
        &self.header
    }

    /// Path the file was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn metadata(&self) -> &MetadataView {
        &self.view
    }

    /// Size of the file in bytes
    pub fn file_size(&self) -> usize {
        self.backend.size()
    }

    /// Raw size of all variables in bytes
    pub fn raw_size(&self) -> Result<usize> {
        self.view.variables().iter().map(|v| v.nbytes()).sum()
    }

    /// Names of the data variables in storage order
    pub fn data_var_names(&self) -> Vec<&str> {
        self.view
            .variables_with_role(VariableRole::Data)
            .map(|v| v.name.as_str())
            .collect()
    }

    fn describe(&self, name: &str) -> Result<&VariableMetadata> {
        self.view
            .variable(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    fn entries(&self, meta: &VariableMetadata) -> &[ChunkIndexEntry] {
        let first = meta.first_chunk as usize;
        &self.index[first..first + meta.chunk_count as usize]
    }

    fn decode(&self, meta: &VariableMetadata, chunk: usize, entry: &ChunkIndexEntry) -> Result<Vec<u8>> {
        let data = &self.backend.as_slice()[self.header.data_offset as usize..];
        let range = entry.payload_range(self.header.data_size)?;
        filters::decode_chunk(&data[range], entry, meta.data_type.size_bytes()).map_err(|err| {
            Error::CorruptedChunk {
                name: meta.name.clone(),
                chunk,
                reason: err.to_string(),
            }
        })
    }

    /// Feed the decoded chunks of a variable to a processor, in grid order
    pub fn process_chunks<P>(&self, name: &str, mut processor: P) -> Result<P::Output>
    where
        P: ChunkProcessor,
        Error: From<P::Error>,
    {
        let meta = self.describe(name)?;
        for (chunk, entry) in self.entries(meta).iter().enumerate() {
            let raw = self.decode(meta, chunk, entry)?;
            processor.process_chunk(&raw, *entry)?;
        }
        Ok(processor.finalize()?)
    }

    /// Read one variable
    pub fn variable(&self, name: &str) -> Result<Variable> {
        let meta = self.describe(name)?;
        let layout = ChunkLayout::new(&meta.shape, &meta.encoding.chunksizes)?;
        let elem = meta.data_type.size_bytes();

        let chunks = self
            .entries(meta)
            .par_iter()
            .enumerate()
            .map(|(chunk, entry)| {
                let raw = self.decode(meta, chunk, entry)?;
                if raw.len() != layout.chunk_len(chunk) * elem {
                    return Err(Error::CorruptedChunk {
                        name: meta.name.clone(),
                        chunk,
                        reason: format!("{} bytes do not match the chunk shape", raw.len()),
                    });
                }
                Ok(raw)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut bytes = vec![0u8; meta.nbytes()?];
        for (chunk, raw) in chunks.iter().enumerate() {
            layout.scatter(&mut bytes, raw, chunk, elem);
        }

        Variable::new(
            meta.name.clone(),
            meta.dims.clone(),
            meta.shape.clone(),
            ArrayData::from_bytes(meta.data_type, &bytes)?,
        )
        .map(|var| var.with_attrs(meta.attrs.clone()))
    }

    /// Read the whole dataset
    pub fn to_dataset(&self) -> Result<Dataset> {
        let mut ds = Dataset::new().with_attrs(self.view.metadata().attrs.clone());
        for meta in self.view.variables() {
            let var = self.variable(&meta.name)?;
            match meta.role {
                VariableRole::Coord => ds.add_coord(var)?,
                VariableRole::Data => ds.add_data_var(var)?,
            }
        }
        Ok(ds)
    }
}

/// Read a whole .bitc file into memory
pub fn open_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    BitcFile::open(path)?.to_dataset()
}

/// Streaming summary statistics of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStats {
    data_type: DataType,
    count: u64,
    nan_count: u64,
    min: f64,
    max: f64,
    sum: f64,
}

/// Result of [`ChunkStats`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableStats {
    pub count: u64,
    pub nan_count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ChunkStats {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            count: 0,
            nan_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        if value.is_nan() {
            self.nan_count += 1;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }
}

impl ChunkProcessor for ChunkStats {
    type Output = VariableStats;
    type Error = Error;

    fn process_chunk(&mut self, chunk_data: &[u8], _entry: ChunkIndexEntry) -> Result<()> {
        let values = ArrayData::from_bytes(self.data_type, chunk_data)?;
        for i in 0..values.len() {
            if let Some(v) = values.get_f64(i) {
                self.add(v);
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<VariableStats> {
        let valid = self.count - self.nan_count;
        Ok(VariableStats {
            count: self.count,
            nan_count: self.nan_count,
            min: if valid > 0 { self.min } else { f64::NAN },
            max: if valid > 0 { self.max } else { f64::NAN },
            mean: if valid > 0 {
                self.sum / valid as f64
            } else {
                f64::NAN
            },
        })
    }
}

impl<B: StorageBackend + Sync> BitcFile<B> {
    /// Summary statistics of a variable, computed chunk by chunk
    pub fn stats(&self, name: &str) -> Result<VariableStats> {
        let meta = self.describe(name)?;
        self.process_chunks(name, ChunkStats::new(meta.data_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CompressOptions;

    fn dataset() -> Dataset {
        let values: Vec<f32> = (0..6 * 5 * 4).map(|i| (i as f32 * 0.37).sin() * 50.0).collect();
        Dataset::new()
            .with_attrs(crate::dataset::Attrs::from([(
                "title".to_string(),
                serde_json::Value::from("test"),
            )]))
            .with_coord(Variable::from_vec("time", &["time"], &[6], (0..6i64).collect::<Vec<_>>()).unwrap())
            .unwrap()
            .with_data_var(
                Variable::from_vec("t", &["time", "lat", "lon"], &[6, 5, 4], values)
                    .unwrap()
                    .with_attr("units", "degC"),
            )
            .unwrap()
            .with_data_var(Variable::from_vec("flag", &["lat"], &[5], vec![1u32, 0, 1, 0, 1]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_roundtrip_with_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bitc");
        let ds = dataset();
        let options = CompressOptions::default()
            .with_chunksize("lat", 2)
            .with_chunksize("lon", 3);
        let summary = to_compressed(&ds, &path, &options).unwrap();
        // time coord 1 + t 1*3*2 + flag 3
        assert_eq!(summary.chunks, 1 + 6 + 3);

        let file = BitcFile::open(&path).unwrap();
        assert_eq!(file.file_size() as u64, summary.file_bytes);
        assert_eq!(file.data_var_names(), vec!["t", "flag"]);
        assert_eq!(file.to_dataset().unwrap(), ds);
    }

    #[test]
    fn test_for_cdo_and_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset();
        let cdo = dir.path().join("cdo.bitc");
        to_compressed(&ds, &cdo, &CompressOptions::default().with_for_cdo(true)).unwrap();
        let file = BitcFile::open(&cdo).unwrap();
        assert_eq!(file.metadata().variable("t").unwrap().chunk_count, 6);
        assert_eq!(file.variable("t").unwrap(), ds.data_var("t").unwrap().clone());

        let raw = dir.path().join("raw.bitc");
        let summary = to_uncompressed(&ds, &raw).unwrap();
        assert!(summary.file_bytes as usize > ds.nbytes());
        assert_eq!(open_dataset(&raw).unwrap(), ds);
    }

    #[test]
    fn test_stats_processor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.bitc");
        let mut ds = Dataset::new();
        ds.add_data_var(
            Variable::from_vec("v", &["x"], &[5], vec![1.0f64, f64::NAN, 3.0, -2.0, 8.0]).unwrap(),
        )
        .unwrap();
        to_compressed(&ds, &path, &CompressOptions::default().with_chunksize("x", 2)).unwrap();
        let stats = BitcFile::open(&path).unwrap().stats("v").unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.nan_count, 1);
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.mean, 2.5);
    }

    #[test]
    fn test_owned_backend_and_unknown_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o.bitc");
        to_compressed(&dataset(), &path, &CompressOptions::default()).unwrap();
        let backend = OwnedBackend::read(&path).unwrap();
        let file = BitcFile::from_backend(backend).unwrap();
        assert!(file.path().is_none());
        assert!(matches!(
            file.variable("nope"),
            Err(Error::UnknownVariable(_))
        ));
    }
}
