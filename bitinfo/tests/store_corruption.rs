use bitinfo::encoding::VariableEncoding;
use bitinfo::metadata::{DatasetMetadata, VariableMetadata, VariableRole};
use bitinfo::store::filters::zlib_compress;
use bitinfo::store::OwnedBackend;
use bitinfo::{
    to_compressed, ArrayData, Attrs, BitcFile, BitcHeader, BitinfoError, ChunkIndexEntry,
    CompressOptions, Compression, DataType, Dataset, Error, Variable,
};
use bitinfo_core::format::constants::{filters, flags};
use std::fs;
use std::path::PathBuf;

fn written(dir: &tempfile::TempDir) -> (PathBuf, Vec<u8>) {
    let values: Vec<f64> = (0..400).map(|i| (i as f64 * 0.1).sin()).collect();
    let ds = Dataset::new()
        .with_data_var(Variable::from_vec("wave", &["y", "x"], &[20, 20], values).unwrap())
        .unwrap();
    let path = dir.path().join("wave.bitc");
    to_compressed(&ds, &path, &CompressOptions::default().with_chunksize("y", 5)).unwrap();
    let bytes = fs::read(&path).unwrap();
    (path, bytes)
}

fn align8(n: usize) -> usize {
    n.div_ceil(8) * 8
}

/// Hand-assembled file with one float32 variable of `len` elements whose
/// single zlib chunk of 16 zero bytes claims to decode to `raw_size` bytes
fn assembled(len: usize, raw_size: u64) -> Vec<u8> {
    let metadata = DatasetMetadata {
        dims: vec![("x".to_string(), len)],
        attrs: Attrs::new(),
        variables: vec![VariableMetadata {
            name: "v".to_string(),
            role: VariableRole::Data,
            dims: vec!["x".to_string()],
            shape: vec![len],
            data_type: DataType::F32,
            attrs: Attrs::new(),
            encoding: VariableEncoding {
                compression: Compression::Zlib,
                shuffle: false,
                complevel: 6,
                chunksizes: vec![len],
            },
            first_chunk: 0,
            chunk_count: 1,
        }],
    }
    .to_bytes()
    .unwrap();
    let payload = zlib_compress(&[0u8; 16], 6).unwrap();
    let entry = ChunkIndexEntry::new(0, payload.len() as u64, raw_size, filters::ZLIB);

    let mut header = BitcHeader::new();
    header.flags = flags::COMPRESSED;
    header.variable_count = 1;
    header.set_metadata_region(BitcHeader::SIZE as u64, metadata.len() as u64);
    let index_offset = align8(BitcHeader::SIZE + metadata.len());
    let data_offset = align8(index_offset + ChunkIndexEntry::SIZE);
    header.index_offset = index_offset as u64;
    header.index_count = 1;
    header.data_offset = data_offset as u64;
    header.data_size = payload.len() as u64;

    let mut bytes = vec![0u8; data_offset + payload.len()];
    bytes[..BitcHeader::SIZE].copy_from_slice(&header.to_bytes());
    bytes[BitcHeader::SIZE..BitcHeader::SIZE + metadata.len()].copy_from_slice(&metadata);
    bytes[index_offset..index_offset + ChunkIndexEntry::SIZE].copy_from_slice(&entry.to_bytes());
    bytes[data_offset..].copy_from_slice(&payload);
    bytes
}

#[test]
fn test_assembled_file_reads() {
    let file = BitcFile::from_backend(OwnedBackend::new(assembled(4, 16))).unwrap();
    assert_eq!(file.variable("v").unwrap().data(), &ArrayData::F32(vec![0.0; 4]));
}

#[test]
fn test_oversized_variable_is_rejected() {
    let result = BitcFile::from_backend(OwnedBackend::new(assembled(1 << 61, 1 << 63)));
    assert!(matches!(result, Err(Error::CorruptedChunk { .. })));
}

#[test]
fn test_entry_size_must_match_chunk() {
    let result = BitcFile::from_backend(OwnedBackend::new(assembled(4, 32)));
    assert!(matches!(
        result,
        Err(Error::CorruptedChunk { chunk: 0, .. })
    ));
}

#[test]
fn test_filters_must_match_header_flags() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut bytes) = written(&dir);
    assert_eq!(bytes[5] & flags::COMPRESSED, flags::COMPRESSED);
    bytes[5] = 0;
    assert!(matches!(
        BitcFile::from_backend(OwnedBackend::new(bytes)),
        Err(Error::Core(BitinfoError::InvalidHeader))
    ));
}

#[test]
fn test_intact_file_opens() {
    let dir = tempfile::tempdir().unwrap();
    let (path, bytes) = written(&dir);
    assert!(BitcFile::open(&path).is_ok());
    assert!(BitcFile::from_backend(OwnedBackend::new(bytes)).is_ok());
}

#[test]
fn test_bad_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut bytes) = written(&dir);
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();
    assert!(BitcFile::open(&path).is_err());
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, bytes) = written(&dir);
    for len in [0, 10, 64, bytes.len() / 2, bytes.len() - 1] {
        fs::write(&path, &bytes[..len]).unwrap();
        assert!(BitcFile::open(&path).is_err(), "length {len} accepted");
    }
}

#[test]
fn test_corrupted_metadata_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut bytes) = written(&dir);
    // the metadata document starts right after the header
    assert_eq!(bytes[64], b'{');
    bytes[64] = b'#';
    assert!(matches!(
        BitcFile::from_backend(OwnedBackend::new(bytes)),
        Err(Error::Json(_))
    ));
}
