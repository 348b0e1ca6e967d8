//! Bitwise real information content
//!
//! For every bit position the mutual information between the bit in an
//! element and the same bit in its neighbour along a dimension is
//! estimated from joint state counts. Information that cannot be told
//! apart from a fair coin at the requested confidence is set to zero.
//!
//! ```rust,no_run
//! use bitinfo::{get_bitinformation, BitInformationOptions, Dataset, DimSelection};
//!
//! fn example(ds: &Dataset) -> bitinfo::Result<()> {
//!     let options = BitInformationOptions::default()
//!         .with_dim(DimSelection::Name("lon".to_string()))
//!         .with_label("air_temperature");
//!     let info = get_bitinformation(ds, &options)?;
//!     for (name, var) in info.iter() {
//!         println!("{name}: {:.3} bits per value", var.total_information());
//!     }
//!     Ok(())
//! }
//! ```

use crate::dataset::{ArrayData, Attrs, Dataset, Variable};
use crate::error::{Error, Result};
use bitinfo_core::{BitFloat, BitPairCounter, BitinfoError, DataType};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default confidence level of the significance test
pub const DEFAULT_CONFIDENCE: f64 = 0.99;

/// Which dimension(s) neighbours are taken along
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DimSelection {
    /// A named dimension
    Name(String),
    /// An axis position; negative values count from the last axis
    Axis(isize),
    /// Every dimension of the variable, keeping the element-wise maximum
    #[default]
    All,
}

impl From<&str> for DimSelection {
    fn from(dim: &str) -> Self {
        DimSelection::Name(dim.to_string())
    }
}

/// Elements excluded from the pair statistics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Mask {
    /// Skip pairs containing NaN
    #[default]
    Nan,
    /// Skip pairs containing this value, converted to each variable's type
    Value(f64),
    /// Count every pair
    None,
}

/// Options for [`get_bitinformation`]
#[derive(Debug, Clone, PartialEq)]
pub struct BitInformationOptions {
    /// Dimension selection
    pub dim: DimSelection,
    /// Cache label; results are stored as `<cache_dir>/<label>.json`
    pub label: Option<String>,
    /// Recompute even when a cached result exists
    pub overwrite: bool,
    /// Directory holding cached results
    pub cache_dir: PathBuf,
    /// Zero information below the significance threshold
    pub set_zero_insignificant: bool,
    /// Confidence level of the significance test, in (0, 1)
    pub confidence: f64,
    /// Masked elements
    pub mask: Mask,
}

impl Default for BitInformationOptions {
    fn default() -> Self {
        Self {
            dim: DimSelection::All,
            label: None,
            overwrite: false,
            cache_dir: PathBuf::from("."),
            set_zero_insignificant: true,
            confidence: DEFAULT_CONFIDENCE,
            mask: Mask::Nan,
        }
    }
}

impl BitInformationOptions {
    /// Set the dimension selection
    pub fn with_dim(mut self, dim: impl Into<DimSelection>) -> Self {
        self.dim = dim.into();
        self
    }

    /// Set the cache label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Recompute cached results
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Toggle the significance filter
    pub fn with_set_zero_insignificant(mut self, enabled: bool) -> Self {
        self.set_zero_insignificant = enabled;
        self
    }

    /// Set the confidence level
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the mask
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = mask;
        self
    }

    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(BitinfoError::InvalidConfidence.into());
        }
        if let Some(label) = &self.label {
            bitinfo_core::validate_name(label)
                .map_err(|_| Error::InvalidParameter(format!("bad cache label `{label}`")))?;
        }
        Ok(())
    }

    /// Path of the cache file, if a label is set
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.label
            .as_ref()
            .map(|label| self.cache_dir.join(format!("{label}.json")))
    }
}

/// Mask converted to one variable's element type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedMask {
    Nan,
    Value(f64),
    None,
}

impl ResolvedMask {
    #[inline]
    fn is_masked<T: BitFloat>(self, x: T) -> bool {
        match self {
            ResolvedMask::Nan => x.is_nan(),
            ResolvedMask::Value(v) => x.to_f64() == v,
            ResolvedMask::None => false,
        }
    }
}

/// Options resolved for a single variable
///
/// Built fresh for every variable from the shared options, which are never
/// modified.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableOptions {
    /// Axes to analyse
    pub axes: Vec<usize>,
    /// Dimension names of `axes`
    pub dims: Vec<String>,
    /// Element-typed mask
    pub mask: ResolvedMask,
    /// Zero insignificant information
    pub set_zero_insignificant: bool,
    /// Confidence level
    pub confidence: f64,
}

/// Resolve the shared options against one variable
///
/// Fails with [`Error::NotFloat`] for integer variables and
/// [`Error::InvalidDimension`] when the selection does not apply.
pub fn prepare_variable_options(
    var: &Variable,
    options: &BitInformationOptions,
) -> Result<VariableOptions> {
    let data_type = var.data_type();
    if !data_type.is_float() {
        return Err(Error::NotFloat {
            name: var.name().to_string(),
            data_type,
        });
    }

    let ndim = var.dims().len();
    let axes: Vec<usize> = match &options.dim {
        DimSelection::Name(dim) => {
            let axis = var.axis_num(dim).ok_or_else(|| {
                Error::InvalidDimension(format!("`{}` has no dimension `{dim}`", var.name()))
            })?;
            vec![axis]
        }
        DimSelection::Axis(axis) => {
            let resolved = if *axis < 0 {
                ndim as isize + axis
            } else {
                *axis
            };
            if resolved < 0 || resolved as usize >= ndim {
                return Err(Error::InvalidDimension(format!(
                    "axis {axis} out of range for `{}` with {ndim} dimensions",
                    var.name()
                )));
            }
            vec![resolved as usize]
        }
        DimSelection::All => (0..ndim).filter(|&a| var.shape()[a] >= 2).collect(),
    };

    if axes.is_empty() {
        return Err(Error::InvalidDimension(format!(
            "`{}` has no dimension with at least two elements",
            var.name()
        )));
    }
    for &axis in &axes {
        if var.shape()[axis] < 2 {
            return Err(Error::InvalidDimension(format!(
                "dimension `{}` of `{}` needs at least two elements",
                var.dims()[axis],
                var.name()
            )));
        }
    }

    // the masked value is converted per variable, f32 data compares against the f32 value
    let mask = match options.mask {
        Mask::Nan => ResolvedMask::Nan,
        Mask::Value(v) if v.is_nan() => ResolvedMask::Nan,
        Mask::Value(v) => ResolvedMask::Value(match data_type {
            DataType::F32 => v as f32 as f64,
            _ => v,
        }),
        Mask::None => ResolvedMask::None,
    };

    Ok(VariableOptions {
        dims: axes.iter().map(|&a| var.dims()[a].clone()).collect(),
        axes,
        mask,
        set_zero_insignificant: options.set_zero_insignificant,
        confidence: options.confidence,
    })
}

/// Bitinformation of one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBitInformation {
    /// Element type of the analysed variable
    pub data_type: DataType,
    /// Dimensions analysed
    pub dims: Vec<String>,
    /// Axis positions of `dims`
    pub axes: Vec<usize>,
    /// Information per bit position, sign bit first
    pub bits: Vec<f64>,
    /// Attributes describing the information itself
    pub attrs: Attrs,
    /// Attributes of the analysed variable
    pub source_attributes: Attrs,
}

impl VariableBitInformation {
    /// Sum of the information over all bits, in bits per value
    pub fn total_information(&self) -> f64 {
        self.bits.iter().filter(|b| !b.is_nan()).sum()
    }

    /// Number of bits per element
    pub fn nbits(&self) -> usize {
        self.bits.len()
    }
}

/// Bitinformation of every analysed variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitInformation {
    variables: BTreeMap<String, VariableBitInformation>,
}

impl BitInformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable's result
    pub fn insert(&mut self, name: impl Into<String>, info: VariableBitInformation) {
        self.variables.insert(name.into(), info);
    }

    pub fn get(&self, name: &str) -> Option<&VariableBitInformation> {
        self.variables.get(name)
    }

    /// Variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableBitInformation)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Load a result written by [`BitInformation::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the result as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Mutual information of one bit from joint probabilities `[p00, p01, p10, p11]`
pub fn bit_mutual_information(p: [f64; 4]) -> f64 {
    let px = [p[0] + p[1], p[2] + p[3]];
    let py = [p[0] + p[2], p[1] + p[3]];
    let mut m = 0.0;
    for x in 0..2 {
        for y in 0..2 {
            let pxy = p[2 * x + y];
            if pxy > 0.0 {
                m += pxy * (pxy / (px[x] * py[y])).log2();
            }
        }
    }
    m.max(0.0)
}

/// Mutual information of every bit position of a counter
pub fn mutual_information(counter: &BitPairCounter) -> Result<Vec<f64>> {
    (0..counter.nbits())
        .map(|i| Ok(bit_mutual_information(counter.joint_probabilities(i)?)))
        .collect()
}

/// Binary entropy in bits
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
}

/// Inverse of the standard normal cumulative distribution
///
/// Rational approximation after P. J. Acklam, relative error below 1.2e-9.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Upper bound of the probability of a fair coin over `n` trials
pub fn binom_confidence(n: u64, confidence: f64) -> f64 {
    let z = normal_quantile(1.0 - (1.0 - confidence) / 2.0);
    (0.5 + z / (2.0 * (n as f64).sqrt())).min(1.0)
}

/// Information a random bit can show over `n` pairs at `confidence`
pub fn binom_free_entropy(n: u64, confidence: f64) -> f64 {
    1.0 - binary_entropy(binom_confidence(n, confidence))
}

/// Joint bit states of neighbours along `axis` of a row-major array
fn count_along_axis<T: BitFloat>(
    values: &[T],
    shape: &[usize],
    axis: usize,
    mask: ResolvedMask,
) -> Result<BitPairCounter> {
    let outer: usize = shape[..axis].iter().product();
    let len = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();
    let block = len * inner;
    let is_masked = move |x: T| mask.is_masked(x);

    // the successor of element k along the axis sits `inner` places later
    let counter = (0..outer)
        .into_par_iter()
        .map(|o| {
            let mut counter = BitPairCounter::for_type::<T>();
            let base = &values[o * block..(o + 1) * block];
            counter.count_slices(&base[..block - inner], &base[inner..], is_masked)?;
            Ok::<_, BitinfoError>(counter)
        })
        .try_reduce(BitPairCounter::for_type::<T>, |mut a, b| {
            a.merge(&b)?;
            Ok::<_, BitinfoError>(a)
        })?;
    Ok(counter)
}

fn typed_bitinformation<T: BitFloat>(
    values: &[T],
    shape: &[usize],
    options: &VariableOptions,
) -> Result<Vec<f64>> {
    let mut result = vec![0.0f64; T::NBITS];
    for &axis in &options.axes {
        let counter = count_along_axis(values, shape, axis, options.mask)?;
        let mut bits = mutual_information(&counter)?;
        if options.set_zero_insignificant {
            let free = binom_free_entropy(counter.pairs(), options.confidence);
            for b in bits.iter_mut().filter(|b| **b <= free) {
                *b = 0.0;
            }
        }
        for (r, b) in result.iter_mut().zip(bits) {
            *r = r.max(b);
        }
    }
    Ok(result)
}

/// Bitinformation of a single variable with resolved options
pub fn variable_bitinformation(
    var: &Variable,
    options: &VariableOptions,
) -> Result<VariableBitInformation> {
    let bits = match var.data() {
        ArrayData::F32(values) => typed_bitinformation(values, var.shape(), options)?,
        ArrayData::F64(values) => typed_bitinformation(values, var.shape(), options)?,
        _ => {
            return Err(Error::NotFloat {
                name: var.name().to_string(),
                data_type: var.data_type(),
            })
        }
    };

    let mut attrs = Attrs::new();
    attrs.insert(
        "long_name".to_string(),
        Value::from(format!("{} bitwise information", var.name())),
    );
    attrs.insert("units".to_string(), Value::from("1"));

    Ok(VariableBitInformation {
        data_type: var.data_type(),
        dims: options.dims.clone(),
        axes: options.axes.clone(),
        bits,
        attrs,
        source_attributes: var.attrs().clone(),
    })
}

fn compute_bitinformation(ds: &Dataset, options: &BitInformationOptions) -> Result<BitInformation> {
    let mut jobs = Vec::new();
    for var in ds.data_vars() {
        match prepare_variable_options(var, options) {
            Ok(resolved) => jobs.push((var, resolved)),
            Err(err @ (Error::NotFloat { .. } | Error::InvalidDimension(_))) => {
                warn!("skipping variable `{}`: {err}", var.name());
            }
            Err(err) => return Err(err),
        }
    }
    if jobs.is_empty() {
        return Err(Error::NothingToAnalyse(format!(
            "{} data variables, none applicable to {:?}",
            ds.data_vars().len(),
            options.dim
        )));
    }

    let results = jobs
        .par_iter()
        .map(|(var, resolved)| {
            debug!(
                "bitinformation of `{}` along {:?}",
                var.name(),
                resolved.dims
            );
            variable_bitinformation(var, resolved).map(|info| (var.name().to_string(), info))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut info = BitInformation::new();
    for (name, var_info) in results {
        info.insert(name, var_info);
    }
    Ok(info)
}

/// Bitwise real information content of every float data variable
///
/// Integer variables and variables the dimension selection does not apply
/// to are skipped with a warning. With a label the result is cached as
/// JSON and reused by later calls unless `overwrite` is set.
pub fn get_bitinformation(ds: &Dataset, options: &BitInformationOptions) -> Result<BitInformation> {
    options.validate()?;

    let cache = options.cache_path();
    if let Some(path) = &cache {
        if path.exists() && !options.overwrite {
            info!("loading cached bitinformation from {}", path.display());
            return BitInformation::load(path);
        }
    }

    let info = compute_bitinformation(ds, options)?;

    if let Some(path) = &cache {
        info.save(path)?;
        info!("saved bitinformation to {}", path.display());
    }
    Ok(info)
}
