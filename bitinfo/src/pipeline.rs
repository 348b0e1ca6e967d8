//! Multi-file flow: analyse the first file, round and compress them all
//!
//! The keepbits derived from the first file are applied to every file so
//! that a split dataset is rounded consistently.

use crate::bitround::{bitround_dataset, KeepbitsSpec};
use crate::encoding::CompressOptions;
use crate::error::{Error, Result};
use crate::information::{get_bitinformation, BitInformationOptions, DimSelection};
use crate::keepbits::{get_keepbits, Keepbits};
use crate::store::{open_dataset, to_compressed};
use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Suffix appended to the file stem of rounded outputs
pub const OUTPUT_SUFFIX: &str = "_bitrounded_compressed";

/// Run parameters of a [`Flow`]
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParameters {
    pub dim: DimSelection,
    pub inflevel: f64,
    /// Recompute cached bitinformation and replace existing outputs
    pub overwrite: bool,
}

impl Default for FlowParameters {
    fn default() -> Self {
        Self {
            dim: DimSelection::Axis(-1),
            inflevel: 0.99,
            overwrite: false,
        }
    }
}

impl FlowParameters {
    pub fn with_dim(mut self, dim: impl Into<DimSelection>) -> Self {
        self.dim = dim.into();
        self
    }

    pub fn with_inflevel(mut self, inflevel: f64) -> Self {
        self.inflevel = inflevel;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// How `bitround_and_save` is mapped over the files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Executor {
    #[default]
    Sequential,
    /// Dedicated rayon pool, `0` threads picks the rayon default
    Parallel { threads: usize },
}

/// Outcome of a flow run
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    /// Keepbits derived from the first file
    pub keepbits: Keepbits,
    /// Output file per input, in input order
    pub outputs: Vec<PathBuf>,
}

/// Path of the rounded and compressed counterpart of `path`
pub fn output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.bitc"))
}

/// Bitinformation and keepbits of one file
///
/// The bitinformation is cached next to the file under its stem.
pub fn get_bitinformation_keepbits(path: &Path, parameters: &FlowParameters) -> Result<Keepbits> {
    let ds = open_dataset(path)?;
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidParameter(format!("no file name in {}", path.display())))?;
    let cache_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let options = BitInformationOptions::default()
        .with_dim(parameters.dim.clone())
        .with_label(label)
        .with_cache_dir(cache_dir)
        .with_overwrite(parameters.overwrite);
    let info = get_bitinformation(&ds, &options)?;
    get_keepbits(&info, &[parameters.inflevel], None)
}

/// Round one file with `keepbits` and write it compressed
///
/// An existing output is kept unless `overwrite` is set.
pub fn bitround_and_save(path: &Path, keepbits: &Keepbits, overwrite: bool) -> Result<PathBuf> {
    let output = output_path(path);
    if output.exists() && !overwrite {
        info!("keeping existing {}", output.display());
        return Ok(output);
    }
    let ds = open_dataset(path)?;
    let rounded = bitround_dataset(&ds, &KeepbitsSpec::try_from(keepbits)?)?;
    to_compressed(&rounded, &output, &CompressOptions::default())?;
    Ok(output)
}

/// A set of files sharing one keepbits table
#[derive(Debug, Clone)]
pub struct Flow {
    paths: Vec<PathBuf>,
    executor: Executor,
}

impl Flow {
    pub fn new<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
            executor: Executor::Sequential,
        }
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Run both tasks
    pub fn run(&self, parameters: &FlowParameters) -> Result<FlowResult> {
        let first = self
            .paths
            .first()
            .ok_or_else(|| Error::InvalidParameter("flow has no input files".to_string()))?;
        let keepbits = get_bitinformation_keepbits(first, parameters)?;
        info!(
            "flow over {} files at inflevel {} with {:?}",
            self.paths.len(),
            parameters.inflevel,
            self.executor
        );

        let task = |path: &PathBuf| bitround_and_save(path, &keepbits, parameters.overwrite);
        let outputs = match self.executor {
            Executor::Sequential => self.paths.iter().map(task).collect::<Result<Vec<_>>>()?,
            Executor::Parallel { threads } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::InvalidParameter(format!("thread pool: {e}")))?;
                pool.install(|| self.paths.par_iter().map(task).collect::<Result<Vec<_>>>())?
            }
        };
        Ok(FlowResult { keepbits, outputs })
    }
}
