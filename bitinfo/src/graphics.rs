//! Data behind the bitinformation figures
//!
//! Rendering backends are out of scope; these functions compute what a
//! figure shows and [`render_text`] draws a terminal version.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::information::BitInformation;
use crate::keepbits::get_keepbits;
use bitinfo_core::format::constants::non_mantissa_bits;
use bitinfo_core::{
    inflevel_for_keepbits, information_cdf_vec, keepbits_for_level, BitinfoError, DataType,
};
use std::fmt::Write;

/// Level marking where 99% of the real information is enclosed
pub const INFBITS_LEVEL: f64 = 0.99;

/// Level treated as all of the real information
pub const INFBITS100_LEVEL: f64 = 0.999_999_999;

/// One row of the bitinformation figure
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
    pub name: String,
    pub data_type: DataType,
    /// Information per bit with zeros replaced by NaN
    pub information: Vec<f64>,
    /// Share of the total information held by the leading bits
    pub cdf: Vec<f64>,
    /// Total information per value in bits
    pub total_information: f64,
    /// Bits holding 99% of the information, sign and exponent included
    pub infbits: usize,
    /// Bits holding all of the information, sign and exponent included
    pub infbits100: usize,
}

impl VariableSummary {
    /// Mantissa bits holding 99% of the information
    pub fn keepbits(&self) -> usize {
        self.infbits
            .saturating_sub(non_mantissa_bits(self.information.len()).unwrap_or(0))
    }
}

/// Everything the bitinformation figure shows
#[derive(Debug, Clone, PartialEq)]
pub struct BitInformationSummary {
    pub variables: Vec<VariableSummary>,
}

impl BitInformationSummary {
    pub fn new(info: &BitInformation) -> Result<Self> {
        let keepbits = get_keepbits(info, &[INFBITS_LEVEL, INFBITS100_LEVEL], None)?;
        let variables = info
            .iter()
            .map(|(name, var)| {
                let nmbits = non_mantissa_bits(var.nbits()).ok_or(BitinfoError::UnsupportedDataType)?;
                let at = |level| keepbits.at(name, level).unwrap_or(0) as usize + nmbits;
                Ok::<_, Error>(VariableSummary {
                    name: name.to_string(),
                    data_type: var.data_type,
                    information: var
                        .bits
                        .iter()
                        .map(|&b| if b == 0.0 { f64::NAN } else { b })
                        .collect(),
                    cdf: information_cdf_vec(&var.bits),
                    total_information: var.total_information(),
                    infbits: at(0),
                    infbits100: at(1),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { variables })
    }

    /// Widest bit count among the variables
    pub fn max_bits(&self) -> usize {
        self.variables
            .iter()
            .map(|v| v.information.len())
            .max()
            .unwrap_or(0)
    }
}

/// Where the labels come from
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// Keepbits are derived from these levels
    Inflevels(Vec<f64>),
    /// Levels are derived from these keepbits
    Keepbits(Vec<u32>),
}

/// Labels of one slice of a figure rounded along a dimension
#[derive(Debug, Clone, PartialEq)]
pub struct SliceLabel {
    /// First index of the slice
    pub start: usize,
    /// One past the last index
    pub end: usize,
    pub inflevel_text: String,
    pub keepbits_text: String,
}

fn level_text(level: f64) -> String {
    let percent = (level * 100.0 * 100.0).round() / 100.0;
    if percent.fract() == 0.0 {
        format!("{percent:.1}%")
    } else {
        format!("{percent}%")
    }
}

/// Slice boundaries and label texts matching [`crate::bitround_along_dim`]
///
/// Slices follow the same split as the rounding: equal strides with the
/// last slice taking the remainder.
pub fn bitinfo_labels(
    info: &BitInformation,
    var: &str,
    dim_len: usize,
    source: &LabelSource,
) -> Result<Vec<SliceLabel>> {
    let var_info = info
        .get(var)
        .ok_or_else(|| Error::UnknownVariable(var.to_string()))?;
    let nbits = var_info.nbits();
    let count = match source {
        LabelSource::Inflevels(levels) => levels.len(),
        LabelSource::Keepbits(keepbits) => keepbits.len(),
    };
    if count == 0 || count > dim_len {
        return Err(Error::InvalidParameter(format!(
            "{count} slices for a dimension of length {dim_len}"
        )));
    }
    let stride = dim_len / count;

    (0..count)
        .map(|i| {
            let (inflevel_text, keepbits_text) = match source {
                LabelSource::Inflevels(levels) => {
                    let keep = keepbits_for_level(&var_info.bits, nbits, levels[i])?;
                    (level_text(levels[i]), keep.to_string())
                }
                LabelSource::Keepbits(keepbits) => {
                    let level = inflevel_for_keepbits(&var_info.bits, nbits, keepbits[i])?;
                    (
                        format!("{:.2}%", level * 100.0),
                        format!("keepbits = {}", keepbits[i]),
                    )
                }
            };
            Ok::<_, Error>(SliceLabel {
                start: stride * i,
                end: if i + 1 == count { dim_len } else { stride * (i + 1) },
                inflevel_text,
                keepbits_text,
            })
        })
        .collect()
}

/// Normalised value histograms on shared geometric bins
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// `nbins + 1` bin edges
    pub bins: Vec<f64>,
    /// Histogram per data variable, each summing to 1 (or all zero)
    pub histograms: Vec<(String, Vec<f64>)>,
}

/// `n` points spaced evenly on a log scale from `start` to `stop`
pub fn geomspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let (a, b) = (start.ln(), stop.ln());
            let step = (b - a) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| (a + step * i as f64).exp()).collect();
            out[0] = start;
            out[n - 1] = stop;
            out
        }
    }
}

fn finite_values(ds: &Dataset, name: &str) -> Vec<f64> {
    ds.data_var(name)
        .map(|var| {
            (0..var.len())
                .filter_map(|i| var.data().get_f64(i))
                .filter(|v| v.is_finite())
                .collect()
        })
        .unwrap_or_default()
}

/// Statistical distribution of every data variable
///
/// Bins span a tenth of the smallest variable mean to ten times the
/// largest. Only positive means are supported.
pub fn distribution(ds: &Dataset, nbins: usize) -> Result<Distribution> {
    if nbins == 0 {
        return Err(Error::InvalidParameter("nbins must be positive".to_string()));
    }
    let names = ds.data_var_names();
    if names.is_empty() {
        return Err(Error::NothingToAnalyse("dataset has no data variables".to_string()));
    }
    let values: Vec<Vec<f64>> = names.iter().map(|n| finite_values(ds, n)).collect();
    let means: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.iter().sum::<f64>() / v.len() as f64)
        .collect();
    let lo = means.iter().copied().fold(f64::INFINITY, f64::min) / 10.0;
    let hi = means.iter().copied().fold(f64::NEG_INFINITY, f64::max) * 10.0;
    if !(lo > 0.0 && hi > lo) {
        return Err(Error::InvalidParameter(
            "distribution bins need positive variable means".to_string(),
        ));
    }

    let bins = geomspace(lo, hi, nbins + 1);
    let histograms = names
        .iter()
        .zip(&values)
        .map(|(name, vals)| {
            let mut counts = vec![0.0; nbins];
            for &v in vals {
                if v < bins[0] || v > bins[nbins] {
                    continue;
                }
                // the last bin is closed on the right
                let i = bins.partition_point(|&edge| edge <= v).saturating_sub(1);
                counts[i.min(nbins - 1)] += 1.0;
            }
            let total: f64 = counts.iter().sum();
            if total > 0.0 {
                counts.iter_mut().for_each(|c| *c /= total);
            }
            (name.to_string(), counts)
        })
        .collect();
    Ok(Distribution { bins, histograms })
}

const SHADES: [char; 9] = [' ', '.', ':', '-', '=', '+', '*', '#', '@'];

fn shade(information: f64) -> char {
    if information.is_nan() {
        return ' ';
    }
    let i = (information.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).ceil() as usize;
    SHADES[i.clamp(1, SHADES.len() - 1)]
}

/// Terminal rendering of the bitinformation figure
///
/// One row per variable: a shaded cell per bit, `|` after the bits holding
/// 99% of the information and the total information per value.
pub fn render_text(summary: &BitInformationSummary) -> String {
    let width = summary
        .variables
        .iter()
        .map(|v| v.name.len())
        .max()
        .unwrap_or(0)
        .max(4);
    let mut out = String::new();
    let _ = writeln!(out, "Real bitwise information content");
    for var in &summary.variables {
        let nmbits = non_mantissa_bits(var.information.len()).unwrap_or(1);
        let layout: String = (0..var.information.len())
            .map(|i| match i {
                0 => 's',
                i if i < nmbits => 'e',
                _ => 'm',
            })
            .collect();
        let mut row = String::with_capacity(var.information.len() + 1);
        for (i, &b) in var.information.iter().enumerate() {
            if i == var.infbits {
                row.push('|');
            }
            row.push(shade(b));
        }
        if var.infbits >= var.information.len() {
            row.push('|');
        }
        let _ = writeln!(out, "{:width$}  {layout}", "");
        let _ = writeln!(
            out,
            "{:width$}  {row}  {:4.1} bits, {} mantissa bits",
            var.name,
            var.total_information,
            var.keepbits()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attrs, Variable};
    use crate::information::VariableBitInformation;

    fn info() -> BitInformation {
        let mut bits = vec![0.0; 32];
        bits[1..9].fill(0.1);
        bits[9..13].fill(0.5);
        bits[13] = 0.05;
        let mut info = BitInformation::new();
        info.insert(
            "air",
            VariableBitInformation {
                data_type: DataType::F32,
                dims: vec!["lon".to_string()],
                axes: vec![1],
                bits,
                attrs: Attrs::new(),
                source_attributes: Attrs::new(),
            },
        );
        info
    }

    #[test]
    fn test_summary() {
        let summary = BitInformationSummary::new(&info()).unwrap();
        let air = &summary.variables[0];
        assert!(air.information[0].is_nan());
        assert_eq!(air.information[1], 0.1);
        assert!((air.total_information - 2.85).abs() < 1e-12);
        assert!((air.cdf[12] - 2.8 / 2.85).abs() < 1e-12);
        assert_eq!(air.cdf[31], 1.0);
        // 0.8 + 2.0 = 2.8 of 2.85 is below 0.99, bit 13 completes it
        assert_eq!(air.infbits, 14);
        assert_eq!(air.infbits100, 14);
        assert_eq!(air.keepbits(), 5);
        assert_eq!(summary.max_bits(), 32);
    }

    #[test]
    fn test_labels_from_inflevels() {
        let labels = bitinfo_labels(
            &info(),
            "air",
            53,
            &LabelSource::Inflevels(vec![1.0, 0.9999, 0.99, 0.975, 0.95]),
        )
        .unwrap();
        let texts: Vec<&str> = labels.iter().map(|l| l.inflevel_text.as_str()).collect();
        assert_eq!(texts, vec!["100.0%", "99.99%", "99.0%", "97.5%", "95.0%"]);
        assert_eq!(labels[0].keepbits_text, "23");
        assert_eq!(labels[4].start, 40);
        assert_eq!(labels[4].end, 53);
    }

    #[test]
    fn test_labels_from_keepbits() {
        let labels = bitinfo_labels(&info(), "air", 10, &LabelSource::Keepbits(vec![4, 5])).unwrap();
        assert_eq!(labels[0].keepbits_text, "keepbits = 4");
        // 2.8 / 2.85
        assert_eq!(labels[0].inflevel_text, "98.25%");
        assert_eq!(labels[1].inflevel_text, "100.00%");
        assert!(bitinfo_labels(&info(), "sst", 10, &LabelSource::Keepbits(vec![4])).is_err());
        assert!(bitinfo_labels(&info(), "air", 1, &LabelSource::Keepbits(vec![4, 5])).is_err());
    }

    #[test]
    fn test_distribution() {
        let ds = Dataset::new()
            .with_data_var(Variable::from_vec("a", &["x"], &[4], vec![1.0f64, 2.0, 3.0, f64::NAN]).unwrap())
            .unwrap()
            .with_data_var(Variable::from_vec("b", &["x"], &[4], vec![100.0f32; 4]).unwrap())
            .unwrap();
        let dist = distribution(&ds, 50).unwrap();
        assert_eq!(dist.bins.len(), 51);
        assert!((dist.bins[0] - 0.2).abs() < 1e-12);
        assert!((dist.bins[50] - 1000.0).abs() < 1e-9);
        for (_, h) in &dist.histograms {
            assert!((h.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }

        let negative = Dataset::new()
            .with_data_var(Variable::from_vec("n", &["x"], &[2], vec![-1.0f64, -2.0]).unwrap())
            .unwrap();
        assert!(distribution(&negative, 10).is_err());
    }

    #[test]
    fn test_render_text() {
        let summary = BitInformationSummary::new(&info()).unwrap();
        let text = render_text(&summary);
        assert!(text.contains("air"));
        assert!(text.contains("seeeeeeeem"));
        assert!(text.contains("5 mantissa bits"));
        assert!(text.contains('|'));
    }
}
