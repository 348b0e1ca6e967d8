//! Keepbits tables derived from bitinformation

use crate::error::{Error, Result};
use crate::information::BitInformation;
use bitinfo_core::keepbits::{
    validate_inflevel, DEFAULT_GRADIENT_THRESHOLD, DEFAULT_GRADIENT_TOLERANCE,
};
use bitinfo_core::{keepbits_for_level, remove_artificial_information, DataType};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Preprocessing of the information profile before keepbits are derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InformationFilter {
    /// Drop trailing information once the cdf has flattened out
    Gradient { threshold: f64, tolerance: f64 },
}

impl InformationFilter {
    /// Gradient filter with the default threshold and tolerance
    pub fn gradient() -> Self {
        InformationFilter::Gradient {
            threshold: DEFAULT_GRADIENT_THRESHOLD,
            tolerance: DEFAULT_GRADIENT_TOLERANCE,
        }
    }

    fn apply(&self, bits: &mut [f64]) -> Result<usize> {
        match *self {
            InformationFilter::Gradient {
                threshold,
                tolerance,
            } => Ok(remove_artificial_information(
                bits,
                bits.len(),
                threshold,
                tolerance,
            )?),
        }
    }
}

/// Keepbits of one variable, one entry per information level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableKeepbits {
    pub data_type: DataType,
    pub keepbits: Vec<u32>,
}

/// Keepbits for every variable at every requested information level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keepbits {
    inflevels: Vec<f64>,
    variables: BTreeMap<String, VariableKeepbits>,
}

impl Keepbits {
    /// Information levels, in the order they were requested
    pub fn inflevels(&self) -> &[f64] {
        &self.inflevels
    }

    /// Keepbits of a variable at every level
    pub fn get(&self, name: &str) -> Option<&[u32]> {
        self.variables.get(name).map(|v| v.keepbits.as_slice())
    }

    /// Keepbits of a variable at level index `level`
    pub fn at(&self, name: &str, level: usize) -> Option<u32> {
        self.get(name).and_then(|k| k.get(level).copied())
    }

    /// Element type of the variable the keepbits were derived for
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.variables.get(name).map(|v| v.data_type)
    }

    /// Variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableKeepbits)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Mantissa bits to keep per variable for each information level
///
/// Levels must lie in `[0, 1]`. A level of exactly 1.0 keeps every mantissa
/// bit. The optional filter runs on a copy of each profile first.
pub fn get_keepbits(
    info: &BitInformation,
    inflevels: &[f64],
    filter: Option<InformationFilter>,
) -> Result<Keepbits> {
    if inflevels.is_empty() {
        return Err(Error::InvalidParameter(
            "at least one information level is required".to_string(),
        ));
    }
    for &level in inflevels {
        validate_inflevel(level)?;
    }

    let mut variables = BTreeMap::new();
    for (name, var) in info.iter() {
        let mut bits = var.bits.clone();
        if let Some(filter) = &filter {
            let zeroed = filter.apply(&mut bits)?;
            if zeroed > 0 {
                debug!("`{name}`: dropped information in the last {zeroed} bits");
            }
        }
        let keepbits = inflevels
            .iter()
            .map(|&level| keepbits_for_level(&bits, bits.len(), level))
            .collect::<bitinfo_core::Result<Vec<u32>>>()?;
        variables.insert(
            name.to_string(),
            VariableKeepbits {
                data_type: var.data_type,
                keepbits,
            },
        );
    }

    Ok(Keepbits {
        inflevels: inflevels.to_vec(),
        variables,
    })
}
