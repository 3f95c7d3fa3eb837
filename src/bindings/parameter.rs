// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Parameters within a constant buffer.

A [`ParameterBinding`] is the resolved location of one reflected parameter: its byte range in the
owning buffer's [`PackedStore`] plus its type.  Bindings are immutable; values flow through the
owning [`ConstantBuffer`](super::constant_buffer::ConstantBuffer), which marks itself dirty on
every write.
*/

use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

use crate::bindings::buffer_types::{Matrix4, ShaderValue, bytes_of, read_value};
use crate::bindings::packed_store::PackedStore;
use crate::bindings::reflection::{ParameterClass, ParameterDescription, ScalarType};
use crate::error::Error;

/// Addresses a parameter by name or by declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKey<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for ParameterKey<'a> {
    fn from(name: &'a str) -> Self {
        ParameterKey::Name(name)
    }
}

impl<'a> From<&'a String> for ParameterKey<'a> {
    fn from(name: &'a String) -> Self {
        ParameterKey::Name(name)
    }
}

impl From<usize> for ParameterKey<'_> {
    fn from(index: usize) -> Self {
        ParameterKey::Index(index)
    }
}

impl Display for ParameterKey<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterKey::Name(name) => f.write_str(name),
            ParameterKey::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl ParameterKey<'_> {
    pub(crate) fn unknown(&self) -> Error {
        Error::UnknownParameter(self.to_string())
    }
}

/// One parameter of a constant buffer, resolved against its layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterBinding {
    index: usize,
    description: ParameterDescription,
}

impl ParameterBinding {
    pub(crate) fn new(index: usize, description: ParameterDescription) -> Self {
        ParameterBinding { index, description }
    }

    /// Position in declaration order.
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn name(&self) -> &str {
        self.description.name()
    }
    pub fn offset(&self) -> usize {
        self.description.offset()
    }
    pub fn size(&self) -> usize {
        self.description.size()
    }
    pub fn class(&self) -> ParameterClass {
        self.description.class()
    }
    pub fn scalar_type(&self) -> ScalarType {
        self.description.scalar_type()
    }
    pub fn element_count(&self) -> usize {
        self.description.element_count()
    }
    pub fn description(&self) -> &ParameterDescription {
        &self.description
    }

    /// Bytes per element.  For a parameter that is not an array this is its whole size.
    pub fn element_size(&self) -> usize {
        if self.description.is_array() {
            self.description.element_size()
        } else {
            self.description.size()
        }
    }

    pub fn element_stride(&self) -> usize {
        self.description.element_stride()
    }

    pub fn is_matrix(&self) -> bool {
        matches!(
            self.class(),
            ParameterClass::MatrixRows | ParameterClass::MatrixColumns
        )
    }

    fn check_size(&self, expected: usize, actual: usize) -> Result<(), Error> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::SizeMismatch { expected, actual })
        }
    }

    fn element_offset(&self, index: usize) -> Result<usize, Error> {
        let count = self.element_count();
        if index >= count {
            return Err(Error::ElementOutOfRange {
                parameter: self.name().to_string(),
                index,
                count,
            });
        }
        Ok(self.offset() + index * self.element_stride())
    }

    pub(crate) fn write_bytes(&self, store: &mut PackedStore, bytes: &[u8]) -> Result<(), Error> {
        self.check_size(self.size(), bytes.len())?;
        store.write(self.offset(), bytes)
    }

    pub(crate) fn read_bytes<'s>(&self, store: &'s PackedStore) -> Result<&'s [u8], Error> {
        store.read(self.offset(), self.size())
    }

    pub(crate) fn write<T: ShaderValue>(&self, store: &mut PackedStore, value: &T) -> Result<(), Error> {
        self.write_bytes(store, bytes_of(value))
    }

    pub(crate) fn read<T: ShaderValue>(&self, store: &PackedStore) -> Result<T, Error> {
        self.check_size(self.size(), size_of::<T>())?;
        Ok(read_value(self.read_bytes(store)?))
    }

    pub(crate) fn write_element<T: ShaderValue>(
        &self,
        store: &mut PackedStore,
        index: usize,
        value: &T,
    ) -> Result<(), Error> {
        self.check_size(self.element_size(), size_of::<T>())?;
        let offset = self.element_offset(index)?;
        store.write(offset, bytes_of(value))
    }

    pub(crate) fn read_element<T: ShaderValue>(&self, store: &PackedStore, index: usize) -> Result<T, Error> {
        self.check_size(self.element_size(), size_of::<T>())?;
        let offset = self.element_offset(index)?;
        Ok(read_value(store.read(offset, size_of::<T>())?))
    }

    /// Writes `values` to elements `0..values.len()`.  Fails before writing anything if there are
    /// more values than elements.
    pub(crate) fn write_array<T: ShaderValue>(&self, store: &mut PackedStore, values: &[T]) -> Result<(), Error> {
        self.check_size(self.element_size(), size_of::<T>())?;
        if values.len() > self.element_count() {
            return Err(Error::ElementOutOfRange {
                parameter: self.name().to_string(),
                index: values.len() - 1,
                count: self.element_count(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            let offset = self.element_offset(index)?;
            store.write(offset, bytes_of(value))?;
        }
        Ok(())
    }

    pub(crate) fn read_array<T: ShaderValue>(&self, store: &PackedStore) -> Result<Vec<T>, Error> {
        (0..self.element_count())
            .map(|index| self.read_element(store, index))
            .collect()
    }

    fn check_matrix(&self) -> Result<(), Error> {
        if self.is_matrix() && self.scalar_type() == ScalarType::Float {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                parameter: self.name().to_string(),
                expected: "float matrix",
            })
        }
    }

    //byte offset of cell (row, column) relative to the start of the element
    fn matrix_cell(&self, row: usize, column: usize) -> usize {
        match self.class() {
            ParameterClass::MatrixColumns => column * 16 + row * 4,
            _ => row * 16 + column * 4,
        }
    }

    /// Packs the top-left `rows x columns` corner of a row-major `matrix` into one element.
    pub(crate) fn write_matrix(&self, store: &mut PackedStore, index: usize, matrix: &Matrix4) -> Result<(), Error> {
        self.check_matrix()?;
        let base = self.element_offset(index)?;
        let rows = self.description.rows() as usize;
        let columns = self.description.columns() as usize;
        //check the whole element first so a failure writes nothing
        store.read(base, self.element_size())?;
        for (row, values) in matrix.iter().enumerate().take(rows) {
            for (column, value) in values.iter().enumerate().take(columns) {
                store.write(base + self.matrix_cell(row, column), bytes_of(value))?;
            }
        }
        Ok(())
    }

    pub(crate) fn read_matrix(&self, store: &PackedStore, index: usize) -> Result<Matrix4, Error> {
        self.check_matrix()?;
        let base = self.element_offset(index)?;
        let mut matrix = [[0.0f32; 4]; 4];
        for row in 0..self.description.rows() as usize {
            for column in 0..self.description.columns() as usize {
                let cell = store.read(base + self.matrix_cell(row, column), 4)?;
                matrix[row][column] = read_value(cell);
            }
        }
        Ok(matrix)
    }
}

/**
A parameter resolved once, for repeated typed access.

Obtained from [`ConstantBuffer::handle`](super::constant_buffer::ConstantBuffer::handle), which
checks that the parameter exists and that `T` has its size.  Reads and writes through the handle
then cannot fail.  A handle belongs to the layout it was resolved against; applying it to a buffer
with a different layout panics.
*/
pub struct ParameterHandle<T> {
    index: usize,
    layout_hash: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParameterHandle<T> {
    pub(crate) fn new(index: usize, layout_hash: u64) -> Self {
        ParameterHandle {
            index,
            layout_hash,
            _marker: PhantomData,
        }
    }

    /// Declaration index of the parameter.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn layout_hash(&self) -> u64 {
        self.layout_hash
    }
}

impl<T> Clone for ParameterHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ParameterHandle<T> {}

impl<T> PartialEq for ParameterHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.layout_hash == other.layout_hash
    }
}
impl<T> Eq for ParameterHandle<T> {}

impl<T> Debug for ParameterHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterHandle")
            .field("index", &self.index)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
