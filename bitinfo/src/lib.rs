//! bitinfo - Bitwise real information content and bit rounding
//!
//! Analyses how many mantissa bits of gridded floating-point data carry
//! real information, rounds away the rest and stores the result compressed.
//!
//! ## Architecture
//!
//! bitinfo separates pure definitions from their I/O implementation:
//!
//! - **bitinfo-core**: bit pair counting, keepbits math, rounding and the
//!   BITC binary layout (no I/O)
//! - **bitinfo**: datasets, the information estimator, the BITC store,
//!   figure data and the multi-file pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bitinfo::{
//!     bitround_dataset, get_bitinformation, get_keepbits, open_dataset, to_compressed,
//!     BitInformationOptions, CompressOptions, KeepbitsSpec,
//! };
//! use std::path::Path;
//!
//! fn example() -> bitinfo::Result<()> {
//!     let ds = open_dataset("air_temperature.bitc")?;
//!     let info = get_bitinformation(&ds, &BitInformationOptions::default().with_dim("lon"))?;
//!     let keepbits = get_keepbits(&info, &[0.99], None)?;
//!     let rounded = bitround_dataset(&ds, &KeepbitsSpec::try_from(&keepbits)?)?;
//!     to_compressed(&rounded, Path::new("air_rounded.bitc"), &CompressOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **mmap**: memory-mapped reads of BITC files (default)
//! - **cli**: the `bitinfo` command line tool (default)

pub use bitinfo_core::bitround::{bitround, bitround_slice, BitRounder};
pub use bitinfo_core::{
    inflevel_for_keepbits, keepbits_for_level, parse_range, BitFloat, BitPairCounter, BitcHeader,
    BitinfoError, ChunkIndexEntry, Compression, DataType,
};

pub mod bitround;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod graphics;
pub mod information;
pub mod keepbits;
pub mod metadata;
pub mod pipeline;
pub mod store;

pub use bitround::{
    bitround_along_dim, bitround_dataset, bitround_variable, KeepbitsSpec,
    DEFAULT_ALONG_DIM_INFLEVELS, KEEPBITS_ATTR,
};
pub use dataset::{ArrayData, Attrs, Dataset, Variable};
pub use encoding::{get_compress_encoding, CompressOptions, VariableEncoding};
pub use error::{Error, Result};
pub use graphics::{
    bitinfo_labels, distribution, render_text, BitInformationSummary, LabelSource, SliceLabel,
};
pub use information::{
    get_bitinformation, BitInformation, BitInformationOptions, DimSelection, Mask,
    VariableBitInformation,
};
pub use keepbits::{get_keepbits, InformationFilter, Keepbits};
pub use metadata::{DatasetMetadata, MetadataBuilder, MetadataView, VariableMetadata};
pub use pipeline::{Executor, Flow, FlowParameters, FlowResult};
pub use store::{open_dataset, to_compressed, to_uncompressed, write_dataset, BitcFile};
