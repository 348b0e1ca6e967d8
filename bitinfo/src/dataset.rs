//! In-memory labelled arrays
//!
//! A [`Dataset`] is a set of named n-dimensional variables sharing named
//! dimensions, split into coordinates and data variables. Values are
//! stored row-major in a typed [`ArrayData`] buffer.

use crate::error::{Error, Result};
use bitinfo_core::{checked_element_count, validate_array_bounds, validate_name, DataType, Element};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;

/// Variable and dataset attributes
pub type Attrs = BTreeMap<String, Value>;

/// Typed, row-major element buffer
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

/// Run `$body` with `$values` bound to the typed vector of any variant
macro_rules! dispatch {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ArrayData::F32($values) => $body,
            ArrayData::F64($values) => $body,
            ArrayData::I32($values) => $body,
            ArrayData::I64($values) => $body,
            ArrayData::U32($values) => $body,
            ArrayData::U64($values) => $body,
        }
    };
}

/// Element types that have an [`ArrayData`] variant
pub trait ArrayElement: Element {
    /// Wrap a vector into its variant
    fn wrap(values: Vec<Self>) -> ArrayData;

    /// Borrow the values if `data` holds this type
    fn view(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! array_element {
    ($ty:ty, $variant:ident) => {
        impl ArrayElement for $ty {
            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn view(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }

        impl From<Vec<$ty>> for ArrayData {
            fn from(values: Vec<$ty>) -> Self {
                ArrayData::$variant(values)
            }
        }
    };
}

array_element!(f32, F32);
array_element!(f64, F64);
array_element!(i32, I32);
array_element!(i64, I64);
array_element!(u32, U32);
array_element!(u64, U64);

impl ArrayData {
    /// Number of elements
    pub fn len(&self) -> usize {
        dispatch!(self, values => values.len())
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type
    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::U64(_) => DataType::U64,
        }
    }

    /// Raw element bytes in host (little-endian) order
    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, values => bytemuck::cast_slice(values.as_slice()))
    }

    /// Size of the raw buffer in bytes
    pub fn nbytes(&self) -> usize {
        self.len() * self.data_type().size_bytes()
    }

    /// Rebuild a buffer from raw bytes of the given type
    pub fn from_bytes(data_type: DataType, bytes: &[u8]) -> Result<Self> {
        Ok(match data_type {
            DataType::F32 => ArrayData::F32(collect_values(bytes)?),
            DataType::F64 => ArrayData::F64(collect_values(bytes)?),
            DataType::I32 => ArrayData::I32(collect_values(bytes)?),
            DataType::I64 => ArrayData::I64(collect_values(bytes)?),
            DataType::U32 => ArrayData::U32(collect_values(bytes)?),
            DataType::U64 => ArrayData::U64(collect_values(bytes)?),
        })
    }

    /// Borrow the values as `T`
    pub fn values<T: ArrayElement>(&self) -> Option<&[T]> {
        T::view(self)
    }

    /// Value at a flat index widened to f64
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        dispatch!(self, values => values.get(index).map(|v| v.to_f64()))
    }

    fn slice_axis(&self, outer: usize, len: usize, inner: usize, range: Range<usize>) -> Self {
        dispatch!(self, values => ArrayData::from(slice_axis(values, outer, len, inner, range)))
    }
}

/// Checked copy of raw little-endian bytes into typed values
// copies, so unaligned mmap slices are fine
fn collect_values<T: ArrayElement>(bytes: &[u8]) -> Result<Vec<T>> {
    validate_array_bounds::<T>(bytes.len())?;
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Copy `range` along the middle axis of an `outer x len x inner` block
fn slice_axis<T: Copy>(
    values: &[T],
    outer: usize,
    len: usize,
    inner: usize,
    range: Range<usize>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(outer * range.len() * inner);
    for o in 0..outer {
        let base = o * len * inner;
        out.extend_from_slice(&values[base + range.start * inner..base + range.end * inner]);
    }
    out
}

/// Join blocks along the middle axis; `parts` holds (values, axis length)
fn concat_axis<T: Copy>(parts: &[(&[T], usize)], outer: usize, inner: usize) -> Vec<T> {
    let total: usize = parts.iter().map(|(v, _)| v.len()).sum();
    let mut out = Vec::with_capacity(total);
    for o in 0..outer {
        for (values, len) in parts {
            let block = len * inner;
            out.extend_from_slice(&values[o * block..(o + 1) * block]);
        }
    }
    out
}

fn concat_typed<T: ArrayElement>(
    parts: &[&Variable],
    axis: usize,
    outer: usize,
    inner: usize,
) -> Result<ArrayData> {
    let mut views = Vec::with_capacity(parts.len());
    for part in parts {
        let values = T::view(&part.data).ok_or_else(|| Error::ShapeMismatch {
            name: part.name.clone(),
            reason: "data types differ between concatenated parts".to_string(),
        })?;
        views.push((values, part.shape[axis]));
    }
    Ok(T::wrap(concat_axis(&views, outer, inner)))
}

/// A named n-dimensional array with attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    data: ArrayData,
    attrs: Attrs,
}

impl Variable {
    /// Create a variable, validating dims, shape and data length
    pub fn new(
        name: impl Into<String>,
        dims: Vec<String>,
        shape: Vec<usize>,
        data: ArrayData,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name).map_err(|_| Error::InvalidParameter(format!("bad name `{name}`")))?;
        if dims.len() != shape.len() {
            return Err(Error::ShapeMismatch {
                name,
                reason: format!("{} dims for {} axes", dims.len(), shape.len()),
            });
        }
        for (i, dim) in dims.iter().enumerate() {
            validate_name(dim)
                .map_err(|_| Error::InvalidDimension(format!("bad dimension name `{dim}`")))?;
            if dims[..i].contains(dim) {
                return Err(Error::InvalidDimension(format!(
                    "dimension `{dim}` repeated in `{name}`"
                )));
            }
        }
        let expected = checked_element_count(&shape)?;
        if expected != data.len() {
            return Err(Error::ShapeMismatch {
                name,
                reason: format!("shape holds {expected} elements, data has {}", data.len()),
            });
        }
        Ok(Self {
            name,
            dims,
            shape,
            data,
            attrs: Attrs::new(),
        })
    }

    /// Convenience constructor from string slices and a typed vector
    pub fn from_vec<T: ArrayElement>(
        name: &str,
        dims: &[&str],
        shape: &[usize],
        values: Vec<T>,
    ) -> Result<Self> {
        Self::new(
            name,
            dims.iter().map(|d| d.to_string()).collect(),
            shape.to_vec(),
            T::wrap(values),
        )
    }

    /// Replace all attributes
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Set one attribute
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    /// Element type
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether bitinformation can be computed for this variable
    pub fn is_float(&self) -> bool {
        self.data_type().is_float()
    }

    /// Position of `dim` in this variable's dimensions
    pub fn axis_num(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Size of a named dimension
    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.axis_num(dim).map(|axis| self.shape[axis])
    }

    /// Replace the data buffer with one of identical length
    pub fn with_data(mut self, data: ArrayData) -> Result<Self> {
        if data.len() != self.data.len() {
            return Err(Error::ShapeMismatch {
                name: self.name,
                reason: format!("replacement holds {} elements", data.len()),
            });
        }
        self.data = data;
        Ok(self)
    }

    /// `(outer, len, inner)` block sizes around `axis`
    pub(crate) fn axis_blocks(&self, axis: usize) -> (usize, usize, usize) {
        let outer = self.shape[..axis].iter().product();
        let inner = self.shape[axis + 1..].iter().product();
        (outer, self.shape[axis], inner)
    }

    /// Select an index range along `dim`
    ///
    /// Variables without `dim` are returned unchanged.
    pub fn isel(&self, dim: &str, range: Range<usize>) -> Result<Variable> {
        let Some(axis) = self.axis_num(dim) else {
            return Ok(self.clone());
        };
        if range.start > range.end || range.end > self.shape[axis] {
            return Err(bitinfo_core::BitinfoError::IndexOutOfBounds.into());
        }
        let (outer, len, inner) = self.axis_blocks(axis);
        let mut shape = self.shape.clone();
        shape[axis] = range.len();
        Ok(Variable {
            name: self.name.clone(),
            dims: self.dims.clone(),
            shape,
            data: self.data.slice_axis(outer, len, inner, range),
            attrs: self.attrs.clone(),
        })
    }

    /// Concatenate variables along `dim`
    ///
    /// All parts must share name, dims, data type and every other axis
    /// length. Attributes are taken from the first part.
    pub fn concat(parts: &[Variable], dim: &str) -> Result<Variable> {
        let first = parts
            .first()
            .ok_or_else(|| Error::InvalidParameter("nothing to concatenate".to_string()))?;
        let axis = first.axis_num(dim).ok_or_else(|| {
            Error::InvalidDimension(format!("`{}` has no dimension `{dim}`", first.name))
        })?;
        for part in &parts[1..] {
            let same_layout = part.dims == first.dims
                && part.data_type() == first.data_type()
                && part
                    .shape
                    .iter()
                    .zip(&first.shape)
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !same_layout {
                return Err(Error::ShapeMismatch {
                    name: first.name.clone(),
                    reason: "parts differ outside the concatenation axis".to_string(),
                });
            }
        }

        let (outer, _, inner) = first.axis_blocks(axis);
        let refs: Vec<&Variable> = parts.iter().collect();
        let data = match first.data_type() {
            DataType::F32 => concat_typed::<f32>(&refs, axis, outer, inner)?,
            DataType::F64 => concat_typed::<f64>(&refs, axis, outer, inner)?,
            DataType::I32 => concat_typed::<i32>(&refs, axis, outer, inner)?,
            DataType::I64 => concat_typed::<i64>(&refs, axis, outer, inner)?,
            DataType::U32 => concat_typed::<u32>(&refs, axis, outer, inner)?,
            DataType::U64 => concat_typed::<u64>(&refs, axis, outer, inner)?,
        };
        let mut shape = first.shape.clone();
        shape[axis] = parts.iter().map(|p| p.shape[axis]).sum();
        Ok(Variable {
            name: first.name.clone(),
            dims: first.dims.clone(),
            shape,
            data,
            attrs: first.attrs.clone(),
        })
    }
}

/// Collection of coordinates and data variables over shared dimensions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    coords: Vec<Variable>,
    data_vars: Vec<Variable>,
    attrs: Attrs,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the global attributes
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    pub fn coords(&self) -> &[Variable] {
        &self.coords
    }

    pub fn data_vars(&self) -> &[Variable] {
        &self.data_vars
    }

    /// Names of the data variables in insertion order
    pub fn data_var_names(&self) -> Vec<&str> {
        self.data_vars.iter().map(|v| v.name()).collect()
    }

    /// Look up a data variable
    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.iter().find(|v| v.name == name)
    }

    /// Look up a coordinate or data variable
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.coords
            .iter()
            .chain(&self.data_vars)
            .find(|v| v.name == name)
    }

    fn check_new_variable(&self, var: &Variable) -> Result<()> {
        if self.variable(&var.name).is_some() {
            return Err(Error::DuplicateVariable(var.name.clone()));
        }
        for (dim, &len) in var.dims.iter().zip(&var.shape) {
            if let Some(existing) = self.dim_size(dim) {
                if existing != len {
                    return Err(Error::ShapeMismatch {
                        name: var.name.clone(),
                        reason: format!("dimension `{dim}` has length {existing}, not {len}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Add a coordinate variable
    pub fn add_coord(&mut self, var: Variable) -> Result<()> {
        self.check_new_variable(&var)?;
        self.coords.push(var);
        Ok(())
    }

    /// Add a data variable
    pub fn add_data_var(&mut self, var: Variable) -> Result<()> {
        self.check_new_variable(&var)?;
        self.data_vars.push(var);
        Ok(())
    }

    /// Builder form of [`Dataset::add_data_var`]
    pub fn with_data_var(mut self, var: Variable) -> Result<Self> {
        self.add_data_var(var)?;
        Ok(self)
    }

    /// Builder form of [`Dataset::add_coord`]
    pub fn with_coord(mut self, var: Variable) -> Result<Self> {
        self.add_coord(var)?;
        Ok(self)
    }

    /// Swap in a data variable of the same name, dims and shape
    pub fn replace_data_var(&mut self, var: Variable) -> Result<()> {
        let slot = self
            .data_vars
            .iter_mut()
            .find(|v| v.name == var.name)
            .ok_or_else(|| Error::UnknownVariable(var.name.clone()))?;
        if slot.dims != var.dims || slot.shape != var.shape {
            return Err(Error::ShapeMismatch {
                name: var.name.clone(),
                reason: "replacement has a different layout".to_string(),
            });
        }
        *slot = var;
        Ok(())
    }

    /// Dimension names and sizes in order of first appearance
    pub fn dims(&self) -> Vec<(String, usize)> {
        let mut dims: Vec<(String, usize)> = Vec::new();
        for var in self.coords.iter().chain(&self.data_vars) {
            for (dim, &len) in var.dims.iter().zip(&var.shape) {
                if !dims.iter().any(|(d, _)| d == dim) {
                    dims.push((dim.clone(), len));
                }
            }
        }
        dims
    }

    /// Length of a named dimension
    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.coords
            .iter()
            .chain(&self.data_vars)
            .find_map(|v| v.dim_size(dim))
    }

    /// Raw size of all variables in bytes
    pub fn nbytes(&self) -> usize {
        self.coords
            .iter()
            .chain(&self.data_vars)
            .map(|v| v.data.nbytes())
            .sum()
    }

    /// Select an index range along `dim` in every variable that has it
    pub fn isel(&self, dim: &str, range: Range<usize>) -> Result<Dataset> {
        if self.dim_size(dim).is_none() {
            return Err(Error::InvalidDimension(format!("no dimension `{dim}`")));
        }
        Ok(Dataset {
            coords: self
                .coords
                .iter()
                .map(|v| v.isel(dim, range.clone()))
                .collect::<Result<_>>()?,
            data_vars: self
                .data_vars
                .iter()
                .map(|v| v.isel(dim, range.clone()))
                .collect::<Result<_>>()?,
            attrs: self.attrs.clone(),
        })
    }

    /// Concatenate datasets along `dim`
    ///
    /// Variables carrying `dim` are joined; variables without it are taken
    /// from the first dataset.
    pub fn concat(parts: &[Dataset], dim: &str) -> Result<Dataset> {
        let first = parts
            .first()
            .ok_or_else(|| Error::InvalidParameter("nothing to concatenate".to_string()))?;

        let join = |select: fn(&Dataset) -> &[Variable]| -> Result<Vec<Variable>> {
            select(first)
                .iter()
                .map(|var| {
                    if var.axis_num(dim).is_none() {
                        return Ok(var.clone());
                    }
                    let pieces = parts
                        .iter()
                        .map(|ds| {
                            select(ds)
                                .iter()
                                .find(|v| v.name == var.name)
                                .cloned()
                                .ok_or_else(|| Error::UnknownVariable(var.name.clone()))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Variable::concat(&pieces, dim)
                })
                .collect()
        };

        Ok(Dataset {
            coords: join(|ds| &ds.coords)?,
            data_vars: join(|ds| &ds.data_vars)?,
            attrs: first.attrs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Variable {
        // 2 x 3 x 2 block numbered 0..12
        Variable::from_vec(
            "t",
            &["time", "lat", "lon"],
            &[2, 3, 2],
            (0..12).map(|v| v as f32).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_variable_validation() {
        assert!(Variable::from_vec("x", &["a"], &[3], vec![1.0f64, 2.0]).is_err());
        assert!(Variable::from_vec("x", &["a", "b"], &[3], vec![1.0f64; 3]).is_err());
        assert!(Variable::from_vec("x", &["a", "a"], &[1, 1], vec![1.0f64]).is_err());
        let scalar = Variable::from_vec("s", &[], &[], vec![2.5f64]).unwrap();
        assert_eq!(scalar.len(), 1);
    }

    #[test]
    fn test_isel_middle_axis() {
        let var = grid();
        let sliced = var.isel("lat", 1..3).unwrap();
        assert_eq!(sliced.shape(), &[2, 2, 2]);
        assert_eq!(
            sliced.data().values::<f32>().unwrap(),
            &[2.0, 3.0, 4.0, 5.0, 8.0, 9.0, 10.0, 11.0]
        );
        assert!(var.isel("lat", 2..4).is_err());
        assert_eq!(var.isel("depth", 0..1).unwrap(), var);
    }

    #[test]
    fn test_concat_restores_original() {
        let var = grid();
        let parts = vec![
            var.isel("lon", 0..1).unwrap(),
            var.isel("lon", 1..2).unwrap(),
        ];
        assert_eq!(Variable::concat(&parts, "lon").unwrap(), var);

        let parts = vec![
            var.isel("time", 0..1).unwrap(),
            var.isel("time", 1..2).unwrap(),
        ];
        assert_eq!(Variable::concat(&parts, "time").unwrap(), var);
    }

    #[test]
    fn test_dataset_dims_and_conflicts() {
        let mut ds = Dataset::new();
        ds.add_coord(Variable::from_vec("lat", &["lat"], &[3], vec![10.0f64, 20.0, 30.0]).unwrap())
            .unwrap();
        ds.add_data_var(grid()).unwrap();
        assert_eq!(
            ds.dims(),
            vec![
                ("lat".to_string(), 3),
                ("time".to_string(), 2),
                ("lon".to_string(), 2)
            ]
        );
        assert!(matches!(
            ds.add_data_var(grid()),
            Err(Error::DuplicateVariable(_))
        ));
        let wrong = Variable::from_vec("w", &["lat"], &[4], vec![0i32; 4]).unwrap();
        assert!(matches!(
            ds.add_data_var(wrong),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(ds.nbytes(), 3 * 8 + 12 * 4);
    }

    #[test]
    fn test_dataset_isel_concat() {
        let ds = Dataset::new()
            .with_coord(Variable::from_vec("lon", &["lon"], &[2], vec![0.0f32, 1.0]).unwrap())
            .unwrap()
            .with_data_var(grid())
            .unwrap()
            .with_data_var(Variable::from_vec("c", &["time"], &[2], vec![1i64, 2]).unwrap())
            .unwrap();
        let a = ds.isel("lon", 0..1).unwrap();
        let b = ds.isel("lon", 1..2).unwrap();
        assert_eq!(a.dim_size("lon"), Some(1));
        assert_eq!(Dataset::concat(&[a, b], "lon").unwrap(), ds);
        assert!(ds.isel("depth", 0..1).is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let data = ArrayData::F64(vec![1.5, -2.25, f64::MAX]);
        let back = ArrayData::from_bytes(DataType::F64, data.as_bytes()).unwrap();
        assert_eq!(back, data);
        assert!(ArrayData::from_bytes(DataType::F32, &[0u8; 5]).is_err());
    }
}
