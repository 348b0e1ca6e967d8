//! Writing datasets to .bitc files
//!
//! File layout: the 64-byte header, the JSON metadata, the chunk index
//! table and the chunk payloads. The index table, the payload region and
//! every payload start on 8-byte boundaries.

use super::filters::encode_chunk;
use super::layout::ChunkLayout;
use crate::dataset::{Dataset, Variable};
use crate::encoding::{get_compress_encoding, CompressOptions, VariableEncoding};
use crate::error::{Error, Result};
use crate::metadata::{MetadataBuilder, VariableRole};
use bitinfo_core::format::constants::{flags, ALIGNMENT_BOUNDARY, MAX_CHUNK_COUNT};
use bitinfo_core::{align_to_8, calculate_padding, BitcHeader, ChunkIndexEntry, Compression};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What a write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub variables: usize,
    pub chunks: usize,
    /// Size of the uncompressed data
    pub raw_bytes: u64,
    /// Size of the file
    pub file_bytes: u64,
}

/// Encoded chunks of one variable
struct EncodedVariable {
    payloads: Vec<(Vec<u8>, u32, u64)>,
}

fn encode_variable(var: &Variable, encoding: &VariableEncoding) -> Result<EncodedVariable> {
    let layout = ChunkLayout::new(var.shape(), &encoding.chunksizes)?;
    let elem = var.data_type().size_bytes();
    let bytes = var.data().as_bytes();
    let payloads = (0..layout.count())
        .into_par_iter()
        .map(|index| {
            let raw = layout.gather(bytes, index, elem);
            let (payload, mask) = encode_chunk(&raw, elem, encoding)?;
            Ok::<_, Error>((payload, mask, raw.len() as u64))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "encoded `{}` into {} chunks of {:?}",
        var.name(),
        payloads.len(),
        encoding.chunksizes
    );
    Ok(EncodedVariable { payloads })
}

fn check_encoding(var: &Variable, encoding: &VariableEncoding) -> Result<()> {
    if encoding.chunksizes.len() != var.shape().len() {
        return Err(Error::ShapeMismatch {
            name: var.name().to_string(),
            reason: format!(
                "{} chunk lengths for {} dimensions",
                encoding.chunksizes.len(),
                var.shape().len()
            ),
        });
    }
    if encoding.chunksizes.contains(&0) {
        return Err(Error::InvalidParameter(format!(
            "zero chunk length for `{}`",
            var.name()
        )));
    }
    Ok(())
}

/// Write a dataset with per-variable encodings
///
/// Variables missing from `encoding`, coordinates included, are stored
/// raw in a single chunk. The file is written next to `path` and renamed
/// into place.
pub fn write_dataset(
    ds: &Dataset,
    path: &Path,
    encoding: &BTreeMap<String, VariableEncoding>,
) -> Result<WriteSummary> {
    if let Some(name) = encoding.keys().find(|name| ds.variable(name).is_none()) {
        return Err(Error::UnknownVariable(name.clone()));
    }

    let mut builder = MetadataBuilder::new(ds);
    let mut encoded = Vec::new();
    let mut header = BitcHeader::new();
    let roles = ds
        .coords()
        .iter()
        .map(|v| (v, VariableRole::Coord))
        .chain(ds.data_vars().iter().map(|v| (v, VariableRole::Data)));

    for (var, role) in roles {
        let var_encoding = encoding
            .get(var.name())
            .cloned()
            .unwrap_or_else(|| VariableEncoding::raw(var));
        check_encoding(var, &var_encoding)?;
        if var_encoding.compression == Compression::Zlib {
            header.flags |= flags::COMPRESSED;
        }
        if var_encoding.shuffle {
            header.flags |= flags::SHUFFLED;
        }
        let chunks = encode_variable(var, &var_encoding)?;
        builder.add_variable(var, role, var_encoding, chunks.payloads.len() as u64);
        encoded.push(chunks);
    }

    let chunk_count = builder.next_chunk() as usize;
    if chunk_count > MAX_CHUNK_COUNT {
        return Err(Error::InvalidParameter(format!(
            "{chunk_count} chunks exceed the limit of {MAX_CHUNK_COUNT}"
        )));
    }
    let metadata = builder.build();
    let metadata_bytes = metadata.to_bytes()?;

    // region layout
    let metadata_offset = BitcHeader::SIZE;
    let index_offset = align_to_8(metadata_offset + metadata_bytes.len());
    let data_offset = align_to_8(index_offset + chunk_count * ChunkIndexEntry::SIZE);

    let mut entries = Vec::with_capacity(chunk_count);
    let mut cursor = 0usize;
    for (payload, mask, raw_size) in encoded.iter().flat_map(|v| &v.payloads) {
        entries.push(ChunkIndexEntry::new(
            cursor as u64,
            payload.len() as u64,
            *raw_size,
            *mask,
        ));
        cursor = align_to_8(cursor + payload.len());
    }
    let data_size = cursor;

    header.variable_count = metadata.variables.len() as u32;
    header.set_metadata_region(metadata_offset as u64, metadata_bytes.len() as u64);
    header.index_offset = index_offset as u64;
    header.index_count = chunk_count as u64;
    header.data_offset = data_offset as u64;
    header.data_size = data_size as u64;

    let tmp_path = temporary_path(path);
    let write = || -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        out.write_all(&header.to_bytes())?;
        out.write_all(&metadata_bytes)?;
        write_padding(&mut out, metadata_offset + metadata_bytes.len(), ALIGNMENT_BOUNDARY)?;
        for entry in &entries {
            out.write_all(&entry.to_bytes())?;
        }
        write_padding(
            &mut out,
            index_offset + chunk_count * ChunkIndexEntry::SIZE,
            ALIGNMENT_BOUNDARY,
        )?;
        for (payload, _, _) in encoded.iter().flat_map(|v| &v.payloads) {
            out.write_all(payload)?;
            write_padding(&mut out, payload.len(), ALIGNMENT_BOUNDARY)?;
        }
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp_path, path)
    };
    if let Err(err) = write() {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            warn!("could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(err.into());
    }

    let summary = WriteSummary {
        path: path.to_path_buf(),
        variables: metadata.variables.len(),
        chunks: chunk_count,
        raw_bytes: ds.nbytes() as u64,
        file_bytes: (data_offset + data_size) as u64,
    };
    info!(
        "wrote {} ({} variables, {} chunks, {} -> {} bytes)",
        path.display(),
        summary.variables,
        summary.chunks,
        summary.raw_bytes,
        summary.file_bytes
    );
    Ok(summary)
}

fn write_padding(out: &mut impl Write, written: usize, boundary: usize) -> std::io::Result<()> {
    const ZEROS: [u8; ALIGNMENT_BOUNDARY] = [0; ALIGNMENT_BOUNDARY];
    out.write_all(&ZEROS[..calculate_padding(written, boundary)])
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a dataset with compression encodings built from `options`
pub fn to_compressed(ds: &Dataset, path: &Path, options: &CompressOptions) -> Result<WriteSummary> {
    let encoding = get_compress_encoding(ds, options)?;
    write_dataset(ds, path, &encoding)
}

/// Write a dataset without any filters
pub fn to_uncompressed(ds: &Dataset, path: &Path) -> Result<WriteSummary> {
    write_dataset(ds, path, &BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Dataset {
        Dataset::new()
            .with_data_var(Variable::from_vec("v", &["x"], &[8], vec![1.5f32; 8]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_temporary_path() {
        assert_eq!(
            temporary_path(Path::new("/data/a.bitc")),
            PathBuf::from("/data/a.bitc.tmp")
        );
    }

    #[test]
    fn test_successful_write_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.bitc");
        to_uncompressed(&small(), &path).unwrap();
        assert!(path.exists());
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn test_failed_write_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by the rename
        let path = dir.path().join("taken.bitc");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let result = to_compressed(&small(), &path, &CompressOptions::default());
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!temporary_path(&path).exists());
        assert!(path.join("keep").exists());
    }
}
