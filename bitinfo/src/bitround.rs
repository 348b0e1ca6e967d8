//! Bit rounding of variables and datasets

use crate::dataset::{ArrayData, Dataset, Variable};
use crate::error::{Error, Result};
use crate::information::BitInformation;
use crate::keepbits::{get_keepbits, Keepbits};
use bitinfo_core::{BitFloat, BitRounder};
use log::debug;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute recording the keepbits a variable was rounded with
pub const KEEPBITS_ATTR: &str = "_QuantizeBitRoundNumberOfSignificantDigits";

/// Information levels used by [`bitround_along_dim`] unless given
pub const DEFAULT_ALONG_DIM_INFLEVELS: [f64; 5] = [1.0, 0.9999, 0.99, 0.975, 0.95];

/// Keepbits to round with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepbitsSpec {
    /// Same keepbits for every variable
    Uniform(u32),
    /// Keepbits per variable name
    PerVariable(BTreeMap<String, u32>),
}

impl KeepbitsSpec {
    /// Keepbits for a variable name
    pub fn for_variable(&self, name: &str) -> Result<u32> {
        match self {
            KeepbitsSpec::Uniform(keep) => Ok(*keep),
            KeepbitsSpec::PerVariable(map) => map
                .get(name)
                .copied()
                .ok_or_else(|| Error::KeepbitsNotFound(name.to_string())),
        }
    }
}

impl From<u32> for KeepbitsSpec {
    fn from(keep: u32) -> Self {
        KeepbitsSpec::Uniform(keep)
    }
}

impl TryFrom<&Keepbits> for KeepbitsSpec {
    type Error = Error;

    /// Only a table with a single information level can be used for rounding
    fn try_from(keepbits: &Keepbits) -> Result<Self> {
        if keepbits.inflevels().len() != 1 {
            return Err(Error::AmbiguousKeepbits(keepbits.inflevels().len()));
        }
        Ok(KeepbitsSpec::PerVariable(
            keepbits
                .iter()
                .filter_map(|(name, k)| k.keepbits.first().map(|&keep| (name.to_string(), keep)))
                .collect(),
        ))
    }
}

fn round_values<T: BitFloat>(values: &[T], keep: u32) -> Result<Vec<T>> {
    let rounder = BitRounder::<T>::new(keep)?;
    let mut out = values.to_vec();
    out.par_chunks_mut(1 << 16)
        .for_each(|chunk| rounder.round_slice(chunk));
    Ok(out)
}

/// Rounded copy of a float variable
///
/// Attributes are kept and the keepbits are recorded under
/// [`KEEPBITS_ATTR`].
pub fn bitround_variable(var: &Variable, spec: &KeepbitsSpec) -> Result<Variable> {
    let keep = spec.for_variable(var.name())?;
    let data = match var.data() {
        ArrayData::F32(values) => ArrayData::F32(round_values(values, keep)?),
        ArrayData::F64(values) => ArrayData::F64(round_values(values, keep)?),
        _ => {
            return Err(Error::NotFloat {
                name: var.name().to_string(),
                data_type: var.data_type(),
            })
        }
    };
    debug!("rounded `{}` to {keep} mantissa bits", var.name());
    let mut rounded = var.clone().with_data(data)?;
    rounded
        .attrs_mut()
        .insert(KEEPBITS_ATTR.to_string(), Value::from(keep));
    Ok(rounded)
}

/// Round every float data variable of a dataset
///
/// Coordinates and integer variables are left untouched.
pub fn bitround_dataset(ds: &Dataset, spec: &KeepbitsSpec) -> Result<Dataset> {
    let mut rounded = ds.clone();
    for var in ds.data_vars().iter().filter(|v| v.is_float()) {
        rounded.replace_data_var(bitround_variable(var, spec)?)?;
    }
    Ok(rounded)
}

/// Round consecutive slices along `dim` with decreasing information levels
///
/// The dimension is cut into `inflevels.len()` slices of equal length, the
/// last one taking the remainder. Slice `i` is rounded with the keepbits of
/// level `i`; slices at level 1.0 stay untouched.
pub fn bitround_along_dim(
    ds: &Dataset,
    info: &BitInformation,
    dim: &str,
    inflevels: &[f64],
) -> Result<Dataset> {
    let size = ds
        .dim_size(dim)
        .ok_or_else(|| Error::InvalidDimension(format!("no dimension `{dim}`")))?;
    if inflevels.is_empty() {
        return Err(Error::InvalidParameter(
            "at least one information level is required".to_string(),
        ));
    }
    let stride = size / inflevels.len();

    let mut slices = Vec::with_capacity(inflevels.len());
    for (i, &level) in inflevels.iter().enumerate() {
        let end = if i + 1 == inflevels.len() {
            size
        } else {
            stride * (i + 1)
        };
        let slice = ds.isel(dim, stride * i..end)?;
        if level == 1.0 {
            slices.push(slice);
        } else {
            let keepbits = get_keepbits(info, &[level], None)?;
            slices.push(bitround_dataset(&slice, &KeepbitsSpec::try_from(&keepbits)?)?);
        }
    }
    Dataset::concat(&slices, dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::information::{get_bitinformation, BitInformationOptions};

    fn ramp(n: usize) -> Dataset {
        Dataset::new()
            .with_data_var(
                Variable::from_vec(
                    "t",
                    &["x"],
                    &[n],
                    (0..n).map(|i| 1.0 + i as f32 * 0.001_234_5).collect(),
                )
                .unwrap()
                .with_attr("units", "K"),
            )
            .unwrap()
            .with_data_var(Variable::from_vec("n", &["x"], &[n], vec![7i32; n]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_round_keeps_attrs_and_records_keepbits() {
        let ds = ramp(16);
        let var = ds.data_var("t").unwrap();
        let rounded = bitround_variable(var, &KeepbitsSpec::Uniform(3)).unwrap();
        assert_eq!(rounded.attrs().get("units"), Some(&Value::from("K")));
        assert_eq!(rounded.attrs().get(KEEPBITS_ATTR), Some(&Value::from(3u32)));
        for v in rounded.data().values::<f32>().unwrap() {
            assert_eq!(v.to_bits() & ((1 << 20) - 1), 0);
        }
        assert!(var.attrs().get(KEEPBITS_ATTR).is_none());
    }

    #[test]
    fn test_missing_keepbits() {
        let ds = ramp(4);
        let spec = KeepbitsSpec::PerVariable(BTreeMap::from([("other".to_string(), 2)]));
        assert!(matches!(
            bitround_dataset(&ds, &spec),
            Err(Error::KeepbitsNotFound(name)) if name == "t"
        ));
        let ints = ds.data_var("n").unwrap();
        assert!(matches!(
            bitround_variable(ints, &KeepbitsSpec::Uniform(2)),
            Err(Error::NotFloat { .. })
        ));
    }

    #[test]
    fn test_dataset_rounding_skips_integers() {
        let ds = ramp(8);
        let rounded = bitround_dataset(&ds, &KeepbitsSpec::Uniform(1)).unwrap();
        assert_eq!(rounded.data_var("n"), ds.data_var("n"));
        assert_ne!(rounded.data_var("t"), ds.data_var("t"));
    }

    #[test]
    fn test_multi_level_keepbits_are_rejected() {
        let ds = ramp(64);
        let info = get_bitinformation(&ds, &BitInformationOptions::default()).unwrap();
        let keepbits = get_keepbits(&info, &[0.9, 0.99], None).unwrap();
        assert!(matches!(
            KeepbitsSpec::try_from(&keepbits),
            Err(Error::AmbiguousKeepbits(2))
        ));
        let single = get_keepbits(&info, &[0.9], None).unwrap();
        let spec = KeepbitsSpec::try_from(&single).unwrap();
        assert!(spec.for_variable("t").is_ok());
    }

    #[test]
    fn test_along_dim_slices() {
        let ds = ramp(103);
        let info = get_bitinformation(&ds, &BitInformationOptions::default()).unwrap();
        let rounded = bitround_along_dim(&ds, &info, "x", &DEFAULT_ALONG_DIM_INFLEVELS).unwrap();
        assert_eq!(rounded.dim_size("x"), Some(103));
        let orig = ds.data_var("t").unwrap().data().values::<f32>().unwrap();
        let new = rounded.data_var("t").unwrap().data().values::<f32>().unwrap();
        // first slice of 20 elements sits at level 1.0
        assert_eq!(&orig[..20], &new[..20]);
        assert!(rounded.data_var("t").unwrap().attrs().get(KEEPBITS_ATTR).is_none());
        assert!(bitround_along_dim(&ds, &info, "y", &DEFAULT_ALONG_DIM_INFLEVELS).is_err());
    }
}
