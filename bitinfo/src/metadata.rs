//! Structured metadata of BITC files
//!
//! The metadata region holds a JSON document describing dimensions,
//! global attributes and every variable: layout, attributes, encoding and
//! the range of chunk index entries holding its data. Lookup by variable
//! name is O(1) through [`MetadataView`].

use crate::dataset::{Attrs, Dataset};
use crate::encoding::VariableEncoding;
use crate::error::{Error, Result};
use bitinfo_core::format::constants::MAX_VARIABLE_BYTES;
use bitinfo_core::{chunk_grid, checked_element_count, DataType};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Whether a variable is a coordinate or a data variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableRole {
    Coord,
    Data,
}

/// Description of one stored variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub name: String,
    pub role: VariableRole,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data_type: DataType,
    pub attrs: Attrs,
    pub encoding: VariableEncoding,
    /// Index of the first chunk entry of this variable
    pub first_chunk: u64,
    /// Number of consecutive chunk entries
    pub chunk_count: u64,
}

impl VariableMetadata {
    /// Chunks along each axis
    pub fn chunk_grid(&self) -> Result<Vec<usize>> {
        let mut grid = vec![0; self.shape.len()];
        chunk_grid(&self.shape, &self.encoding.chunksizes, &mut grid)?;
        Ok(grid)
    }

    /// Number of elements
    pub fn len(&self) -> Result<usize> {
        Ok(checked_element_count(&self.shape)?)
    }

    /// Raw size in bytes
    pub fn nbytes(&self) -> Result<usize> {
        self.len()?
            .checked_mul(self.data_type.size_bytes())
            .ok_or_else(|| bitinfo_core::BitinfoError::ArraySizeOverflow.into())
    }
}

/// The complete metadata document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Dimension names and lengths
    pub dims: Vec<(String, usize)>,
    /// Global attributes
    pub attrs: Attrs,
    /// Variables in storage order
    pub variables: Vec<VariableMetadata>,
}

impl DatasetMetadata {
    /// Serialize to the bytes stored in the metadata region
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse the metadata region
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check internal consistency against a chunk index of `index_count` entries
    ///
    /// Every variable must own a contiguous, non-overlapping range of chunk
    /// entries matching its chunk grid.
    pub fn validate(&self, index_count: u64) -> Result<()> {
        let mut next_chunk = 0u64;
        for var in &self.variables {
            let corrupt = |reason: String| Error::CorruptedChunk {
                name: var.name.clone(),
                chunk: 0,
                reason,
            };
            if var.dims.len() != var.shape.len() || var.encoding.chunksizes.len() != var.shape.len()
            {
                return Err(Error::ShapeMismatch {
                    name: var.name.clone(),
                    reason: "dims, shape and chunks disagree".to_string(),
                });
            }
            for (dim, &len) in var.dims.iter().zip(&var.shape) {
                if !self.dims.iter().any(|(d, l)| d == dim && *l == len) {
                    return Err(Error::InvalidDimension(format!(
                        "`{}` uses undeclared dimension `{dim}` of length {len}",
                        var.name
                    )));
                }
            }
            let nbytes = var.nbytes()?;
            if nbytes > MAX_VARIABLE_BYTES {
                return Err(corrupt(format!(
                    "{nbytes} bytes exceed the limit of {MAX_VARIABLE_BYTES}"
                )));
            }
            let expected: usize = var.chunk_grid()?.iter().product();
            if var.chunk_count != expected as u64 {
                return Err(corrupt(format!(
                    "{} chunk entries for a grid of {expected}",
                    var.chunk_count
                )));
            }
            if var.first_chunk != next_chunk {
                return Err(corrupt("chunk ranges are not contiguous".to_string()));
            }
            next_chunk = var
                .first_chunk
                .checked_add(var.chunk_count)
                .ok_or(bitinfo_core::BitinfoError::ArraySizeOverflow)?;
        }
        if next_chunk != index_count {
            return Err(Error::Core(bitinfo_core::BitinfoError::CorruptedData));
        }
        Ok(())
    }
}

/// Builder collecting variable descriptions in storage order
pub struct MetadataBuilder {
    metadata: DatasetMetadata,
    next_chunk: u64,
}

impl MetadataBuilder {
    /// Start from a dataset's dimensions and global attributes
    pub fn new(ds: &Dataset) -> Self {
        Self {
            metadata: DatasetMetadata {
                dims: ds.dims(),
                attrs: ds.attrs().clone(),
                variables: Vec::new(),
            },
            next_chunk: 0,
        }
    }

    /// Chunk entry index the next variable will start at
    pub fn next_chunk(&self) -> u64 {
        self.next_chunk
    }

    /// Append a variable owning the next `chunk_count` chunk entries
    pub fn add_variable(
        &mut self,
        var: &crate::dataset::Variable,
        role: VariableRole,
        encoding: VariableEncoding,
        chunk_count: u64,
    ) -> &mut Self {
        self.metadata.variables.push(VariableMetadata {
            name: var.name().to_string(),
            role,
            dims: var.dims().to_vec(),
            shape: var.shape().to_vec(),
            data_type: var.data_type(),
            attrs: var.attrs().clone(),
            encoding,
            first_chunk: self.next_chunk,
            chunk_count,
        });
        self.next_chunk += chunk_count;
        self
    }

    pub fn build(self) -> DatasetMetadata {
        self.metadata
    }
}

/// Metadata with O(1) variable lookup
#[derive(Debug, Clone)]
pub struct MetadataView {
    metadata: DatasetMetadata,
    by_name: HashMap<String, usize>,
}

impl MetadataView {
    /// Index the variables of a metadata document
    pub fn new(metadata: DatasetMetadata) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(metadata.variables.len());
        for (i, var) in metadata.variables.iter().enumerate() {
            if by_name.insert(var.name.clone(), i).is_some() {
                return Err(Error::DuplicateVariable(var.name.clone()));
            }
        }
        Ok(Self { metadata, by_name })
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Option<&VariableMetadata> {
        self.by_name
            .get(name)
            .map(|&i| &self.metadata.variables[i])
    }

    /// Variables in storage order
    pub fn variables(&self) -> &[VariableMetadata] {
        &self.metadata.variables
    }

    /// Variables of one role in storage order
    pub fn variables_with_role(&self, role: VariableRole) -> impl Iterator<Item = &VariableMetadata> {
        self.metadata.variables.iter().filter(move |v| v.role == role)
    }
}
