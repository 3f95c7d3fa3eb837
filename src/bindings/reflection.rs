// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reflected constant buffer layouts.
//!
//! Shader reflection lives outside this crate.  Whatever performs it describes each constant
//! buffer with a [`ConstantBufferDescription`]: the buffer's name and size, and for every
//! parameter its name, offset, size and type.  Offsets come from the shader compiler and are
//! trusted as given.
//!
//! The convenience constructors on [`ParameterDescription`] compute sizes with the usual
//! constant-buffer packing rules: a matrix occupies one 16-byte register per row (or per column,
//! when column-major) with the last register only as long as it needs to be, and every array
//! element starts on a 16-byte register boundary.
//!
//! # Example
//!
//! ```
//! use effect_binding::bindings::reflection::*;
//!
//! let per_object = ConstantBufferDescription::new("PerObject", 80)
//!     .with_parameter(ParameterDescription::matrix("World", 0, 4, 4, MatrixOrder::RowMajor))
//!     .with_parameter(ParameterDescription::vector("Color", 64, ScalarType::Float, 4));
//! assert_eq!(per_object.parameters()[0].size(), 64);
//! assert_eq!(per_object.parameters()[1].size(), 16);
//! ```

use crate::bittricks::align_up;

/// Size of one constant buffer register.
pub const REGISTER_SIZE: usize = 16;

/// Shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterClass {
    Scalar,
    Vector,
    /// A matrix stored one row per register.
    MatrixRows,
    /// A matrix stored one column per register.
    MatrixColumns,
    Struct,
}

/// Component type of a parameter.  Structs report the type of nothing in particular and use
/// [`ScalarType::Float`] by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Float,
    Half,
}

impl ScalarType {
    /// Bytes per component.
    pub const fn size(self) -> usize {
        match self {
            ScalarType::Half => 2,
            ScalarType::Bool | ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
        }
    }
}

/// Storage order for [`ParameterDescription::matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixOrder {
    RowMajor,
    ColumnMajor,
}

/// One parameter of a constant buffer, as reported by reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterDescription {
    name: String,
    offset: usize,
    size: usize,
    class: ParameterClass,
    scalar_type: ScalarType,
    rows: u32,
    columns: u32,
    //0 when the parameter is not an array
    elements: u32,
}

impl ParameterDescription {
    /// Describes a parameter exactly as reflection reports it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        offset: usize,
        size: usize,
        class: ParameterClass,
        scalar_type: ScalarType,
        rows: u32,
        columns: u32,
        elements: u32,
    ) -> Self {
        ParameterDescription {
            name: name.into(),
            offset,
            size,
            class,
            scalar_type,
            rows,
            columns,
            elements,
        }
    }

    pub fn scalar(name: impl Into<String>, offset: usize, scalar_type: ScalarType) -> Self {
        Self::new(
            name,
            offset,
            scalar_type.size(),
            ParameterClass::Scalar,
            scalar_type,
            1,
            1,
            0,
        )
    }

    pub fn vector(name: impl Into<String>, offset: usize, scalar_type: ScalarType, columns: u32) -> Self {
        Self::new(
            name,
            offset,
            scalar_type.size() * columns as usize,
            ParameterClass::Vector,
            scalar_type,
            1,
            columns,
            0,
        )
    }

    /// A float matrix of `rows` x `columns`.
    pub fn matrix(name: impl Into<String>, offset: usize, rows: u32, columns: u32, order: MatrixOrder) -> Self {
        let class = match order {
            MatrixOrder::RowMajor => ParameterClass::MatrixRows,
            MatrixOrder::ColumnMajor => ParameterClass::MatrixColumns,
        };
        let mut description =
            Self::new(name, offset, 0, class, ScalarType::Float, rows, columns, 0);
        description.size = description.element_size();
        description
    }

    /// A struct occupying `size` bytes.
    pub fn structure(name: impl Into<String>, offset: usize, size: usize) -> Self {
        Self::new(
            name,
            offset,
            size,
            ParameterClass::Struct,
            ScalarType::Float,
            0,
            0,
            0,
        )
    }

    /// Turns the parameter into an array of `elements`, recomputing its packed size.
    pub fn array(mut self, elements: u32) -> Self {
        if self.class == ParameterClass::Struct {
            let single = self.size;
            self.elements = elements;
            if elements > 1 {
                self.size = align_up(single, REGISTER_SIZE) * (elements as usize - 1) + single;
            }
            return self;
        }
        let element = self.element_size();
        self.elements = elements;
        self.size = if elements > 1 {
            align_up(element, REGISTER_SIZE) * (elements as usize - 1) + element
        } else {
            element
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// Total packed size, all elements included.
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn class(&self) -> ParameterClass {
        self.class
    }
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }
    pub fn rows(&self) -> u32 {
        self.rows
    }
    pub fn columns(&self) -> u32 {
        self.columns
    }
    /// Declared element count; 0 for a parameter that is not an array.
    pub fn elements(&self) -> u32 {
        self.elements
    }
    pub fn is_array(&self) -> bool {
        self.elements > 0
    }
    /// Number of addressable elements, 1 for a parameter that is not an array.
    pub fn element_count(&self) -> usize {
        self.elements.max(1) as usize
    }

    /// Distance in bytes between consecutive array elements.
    pub fn element_stride(&self) -> usize {
        let count = self.element_count();
        if count == 1 {
            return self.size;
        }
        match self.class {
            ParameterClass::Struct => align_up(self.size, REGISTER_SIZE) / count,
            _ => align_up(self.element_size(), REGISTER_SIZE),
        }
    }

    /// Packed size of one element.  The last element of an array is not padded to a register.
    pub fn element_size(&self) -> usize {
        let component = self.scalar_type.size();
        let rows = self.rows.max(1) as usize;
        let columns = self.columns.max(1) as usize;
        match self.class {
            ParameterClass::Scalar => component,
            ParameterClass::Vector => component * columns,
            ParameterClass::MatrixRows => REGISTER_SIZE * (rows - 1) + component * columns,
            ParameterClass::MatrixColumns => REGISTER_SIZE * (columns - 1) + component * rows,
            //0 when the declared size cannot hold the leading elements
            ParameterClass::Struct => {
                let count = self.element_count();
                self.element_stride()
                    .checked_mul(count - 1)
                    .and_then(|leading| self.size.checked_sub(leading))
                    .unwrap_or(0)
            }
        }
    }
}

/// One constant buffer, as reported by reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantBufferDescription {
    name: String,
    size: usize,
    parameters: Vec<ParameterDescription>,
}

impl ConstantBufferDescription {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        ConstantBufferDescription {
            name: name.into(),
            size,
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter.  Parameters keep declaration order.
    pub fn with_parameter(mut self, parameter: ParameterDescription) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn add_parameter(&mut self, parameter: ParameterDescription) {
        self.parameters.push(parameter);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn parameters(&self) -> &[ParameterDescription] {
        &self.parameters
    }
}
