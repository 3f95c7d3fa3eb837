// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
CPU-mirrored constant buffers.

A [`ConstantBuffer`] owns a [`PackedStore`] holding the bytes the shader will see, a dirty flag,
and the GPU buffer they are uploaded to.  Setters only touch the CPU mirror; [`ConstantBuffer::update`]
is the single place that transfers data, and it does so in one upload of the whole store, only when
something changed since the last successful upload.

```
use std::sync::Arc;
use effect_binding::SoftwareDevice;
use effect_binding::bindings::buffer_types::IDENTITY;
use effect_binding::bindings::constant_buffer::ConstantBuffer;
use effect_binding::bindings::reflection::*;

let device = Arc::new(SoftwareDevice::new());
let description = ConstantBufferDescription::new("PerObject", 80)
    .with_parameter(ParameterDescription::matrix("World", 0, 4, 4, MatrixOrder::RowMajor))
    .with_parameter(ParameterDescription::vector("Color", 64, ScalarType::Float, 4));
let mut buffer = ConstantBuffer::new(&device, description).unwrap();

buffer.set_matrix("World", &IDENTITY).unwrap();
buffer.set("Color", &[1.0f32, 0.0, 0.0, 1.0]).unwrap();
assert!(buffer.is_dirty());
buffer.update().unwrap();
assert!(!buffer.is_dirty());
assert_eq!(device.uploads(), 1);
```
*/

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use foldhash::HashMap;

use crate::bindings::buffer_types::{Matrix4, ShaderValue};
use crate::bindings::packed_store::PackedStore;
use crate::bindings::parameter::{ParameterBinding, ParameterHandle, ParameterKey};
use crate::bindings::reflection::{ConstantBufferDescription, ParameterClass, ScalarType};
use crate::error::Error;
use crate::hashing::structural_hash;
use crate::images::device::BoundDevice;

/**
The validated layout of one constant buffer.

Built once from reflection and shared between every [`ConstantBuffer`] with the same
description.  Two layouts are equal when their descriptions are; the structural hash is computed
at construction and compared first.
*/
#[derive(Clone)]
pub struct ConstantBufferLayout {
    description: ConstantBufferDescription,
    parameters: Vec<ParameterBinding>,
    by_name: HashMap<String, usize>,
    hash: u64,
}

impl ConstantBufferLayout {
    /// Validates `description`.
    ///
    /// Every parameter must lie within the buffer, array elements must fit inside their parameter,
    /// matrices must be at most 4x4, and names must be unique.  Overlap between parameters is not
    /// checked.
    pub fn new(description: ConstantBufferDescription) -> Result<Self, Error> {
        let mut parameters = Vec::with_capacity(description.parameters().len());
        let mut by_name = HashMap::default();
        for (index, parameter) in description.parameters().iter().enumerate() {
            let end = parameter.offset().checked_add(parameter.size());
            if end.is_none_or(|end| end > description.size()) {
                return Err(Error::InvalidLayout(format!(
                    "{} at {}+{} exceeds {} ({} bytes)",
                    parameter.name(),
                    parameter.offset(),
                    parameter.size(),
                    description.name(),
                    description.size()
                )));
            }
            if matches!(
                parameter.class(),
                ParameterClass::MatrixRows | ParameterClass::MatrixColumns
            ) && !((1..=4).contains(&parameter.rows()) && (1..=4).contains(&parameter.columns()))
            {
                return Err(Error::InvalidLayout(format!(
                    "{} is a {}x{} matrix",
                    parameter.name(),
                    parameter.rows(),
                    parameter.columns()
                )));
            }
            let binding = ParameterBinding::new(index, parameter.clone());
            let count = binding.element_count();
            let extent = binding
                .element_stride()
                .checked_mul(count - 1)
                .and_then(|leading| leading.checked_add(binding.element_size()));
            let packed = count == 1
                || (binding.element_size() > 0 && binding.element_stride() >= binding.element_size());
            if !packed || extent.is_none_or(|extent| extent > parameter.size()) {
                return Err(Error::InvalidLayout(format!(
                    "{} cannot hold {count} elements in {} bytes",
                    parameter.name(),
                    parameter.size()
                )));
            }
            if by_name.insert(parameter.name().to_string(), index).is_some() {
                return Err(Error::InvalidLayout(format!(
                    "{} is declared twice in {}",
                    parameter.name(),
                    description.name()
                )));
            }
            parameters.push(binding);
        }
        let hash = structural_hash(&description);
        Ok(ConstantBufferLayout {
            description,
            parameters,
            by_name,
            hash,
        })
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }
    pub fn size(&self) -> usize {
        self.description.size()
    }
    pub fn description(&self) -> &ConstantBufferDescription {
        &self.description
    }
    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterBinding] {
        &self.parameters
    }
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }

    pub fn parameter<'k>(&self, key: impl Into<ParameterKey<'k>>) -> Result<&ParameterBinding, Error> {
        let key = key.into();
        let index = match key {
            ParameterKey::Name(name) => self.by_name.get(name).copied(),
            ParameterKey::Index(index) => Some(index),
        };
        index
            .and_then(|index| self.parameters.get(index))
            .ok_or_else(|| key.unknown())
    }
}

impl PartialEq for ConstantBufferLayout {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.description == other.description
    }
}
impl Eq for ConstantBufferLayout {}

impl Hash for ConstantBufferLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Debug for ConstantBufferLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantBufferLayout")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// A constant buffer: CPU mirror, dirty flag and GPU buffer.
pub struct ConstantBuffer<D: BoundDevice> {
    layout: Arc<ConstantBufferLayout>,
    store: PackedStore,
    dirty: bool,
    gpu: D::ConstantBuffer,
    device: Arc<D>,
}

impl<D: BoundDevice> ConstantBuffer<D> {
    /// Validates `description` and creates the buffer on `device`.
    pub fn new(device: &Arc<D>, description: ConstantBufferDescription) -> Result<Self, Error> {
        Self::with_layout(device, Arc::new(ConstantBufferLayout::new(description)?))
    }

    /// Creates a buffer sharing an already validated layout.
    pub fn with_layout(device: &Arc<D>, layout: Arc<ConstantBufferLayout>) -> Result<Self, Error> {
        let gpu = device
            .create_constant_buffer(layout.size(), layout.name())
            .map_err(|e| {
                logwise::warn_sync!(
                    "could not create constant buffer {name}: {err}",
                    name = logwise::privacy::LogIt(layout.name()),
                    err = logwise::privacy::LogIt(&e)
                );
                Error::DeviceResourceCreationFailure(e)
            })?;
        Ok(ConstantBuffer {
            store: PackedStore::new(layout.size()),
            layout,
            dirty: true,
            gpu,
            device: device.clone(),
        })
    }

    pub fn name(&self) -> &str {
        self.layout.name()
    }
    pub fn size(&self) -> usize {
        self.layout.size()
    }
    pub fn layout(&self) -> &Arc<ConstantBufferLayout> {
        &self.layout
    }
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Whether the CPU mirror has changed since the last successful [`update`](Self::update).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces the next [`update`](Self::update) to upload, e.g. after the GPU buffer was
    /// recreated behind our back.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn gpu_buffer(&self) -> &D::ConstantBuffer {
        &self.gpu
    }

    /// The CPU mirror, exactly as it will be uploaded.
    pub fn as_bytes(&self) -> &[u8] {
        self.store.as_bytes()
    }

    pub fn parameter<'k>(&self, key: impl Into<ParameterKey<'k>>) -> Result<&ParameterBinding, Error> {
        self.layout.parameter(key)
    }
    pub fn parameters(&self) -> &[ParameterBinding] {
        self.layout.parameters()
    }
    pub fn parameter_count(&self) -> usize {
        self.layout.parameters().len()
    }

    //resolves against the shared layout, leaving `store` free to borrow mutably
    fn resolve<'k>(&self, key: impl Into<ParameterKey<'k>>) -> Result<(Arc<ConstantBufferLayout>, usize), Error> {
        let index = self.layout.parameter(key)?.index();
        Ok((self.layout.clone(), index))
    }

    fn written(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        result?;
        self.dirty = true;
        Ok(())
    }

    /// Sets a parameter.  `T` must be exactly the parameter's declared size.
    pub fn set<'k, T: ShaderValue>(&mut self, key: impl Into<ParameterKey<'k>>, value: &T) -> Result<(), Error> {
        let (layout, index) = self.resolve(key)?;
        let result = layout.parameters()[index].write(&mut self.store, value);
        self.written(result)
    }

    pub fn get<'k, T: ShaderValue>(&self, key: impl Into<ParameterKey<'k>>) -> Result<T, Error> {
        self.layout.parameter(key)?.read(&self.store)
    }

    /// Sets a parameter from raw bytes, which must be exactly its declared size.
    pub fn set_bytes<'k>(&mut self, key: impl Into<ParameterKey<'k>>, bytes: &[u8]) -> Result<(), Error> {
        let (layout, index) = self.resolve(key)?;
        let result = layout.parameters()[index].write_bytes(&mut self.store, bytes);
        self.written(result)
    }

    pub fn get_bytes<'k>(&self, key: impl Into<ParameterKey<'k>>) -> Result<&[u8], Error> {
        self.layout.parameter(key)?.read_bytes(&self.store)
    }

    /// Sets one element of an array parameter.  `T` must be the element size.
    pub fn set_element<'k, T: ShaderValue>(
        &mut self,
        key: impl Into<ParameterKey<'k>>,
        index: usize,
        value: &T,
    ) -> Result<(), Error> {
        let (layout, parameter) = self.resolve(key)?;
        let result = layout.parameters()[parameter].write_element(&mut self.store, index, value);
        self.written(result)
    }

    pub fn get_element<'k, T: ShaderValue>(&self, key: impl Into<ParameterKey<'k>>, index: usize) -> Result<T, Error> {
        self.layout.parameter(key)?.read_element(&self.store, index)
    }

    /// Sets the leading elements of an array parameter.  Elements past `values.len()` keep their
    /// contents.
    pub fn set_array<'k, T: ShaderValue>(&mut self, key: impl Into<ParameterKey<'k>>, values: &[T]) -> Result<(), Error> {
        let (layout, index) = self.resolve(key)?;
        let result = layout.parameters()[index].write_array(&mut self.store, values);
        self.written(result)
    }

    pub fn get_array<'k, T: ShaderValue>(&self, key: impl Into<ParameterKey<'k>>) -> Result<Vec<T>, Error> {
        self.layout.parameter(key)?.read_array(&self.store)
    }

    /// Sets a float matrix from a row-major 4x4.  Only the parameter's `rows x columns` corner is
    /// stored; column-major parameters are transposed on the way in.
    pub fn set_matrix<'k>(&mut self, key: impl Into<ParameterKey<'k>>, matrix: &Matrix4) -> Result<(), Error> {
        self.set_matrix_element(key, 0, matrix)
    }

    pub fn set_matrix_element<'k>(
        &mut self,
        key: impl Into<ParameterKey<'k>>,
        index: usize,
        matrix: &Matrix4,
    ) -> Result<(), Error> {
        let (layout, parameter) = self.resolve(key)?;
        let result = layout.parameters()[parameter].write_matrix(&mut self.store, index, matrix);
        self.written(result)
    }

    /// Reads a float matrix back as a row-major 4x4.  Cells outside the parameter read as `0.0`.
    pub fn get_matrix<'k>(&self, key: impl Into<ParameterKey<'k>>) -> Result<Matrix4, Error> {
        self.get_matrix_element(key, 0)
    }

    pub fn get_matrix_element<'k>(&self, key: impl Into<ParameterKey<'k>>, index: usize) -> Result<Matrix4, Error> {
        self.layout.parameter(key)?.read_matrix(&self.store, index)
    }

    /// Sets a boolean parameter.
    pub fn set_bool<'k>(&mut self, key: impl Into<ParameterKey<'k>>, value: bool) -> Result<(), Error> {
        let (layout, index) = self.resolve(key)?;
        let parameter = &layout.parameters()[index];
        if parameter.scalar_type() != ScalarType::Bool {
            return Err(Error::TypeMismatch {
                parameter: parameter.name().to_string(),
                expected: "bool",
            });
        }
        let result = parameter.write(&mut self.store, &crate::bindings::buffer_types::bool::new(value));
        self.written(result)
    }

    /// Resolves a parameter for repeated typed access.  Fails when the parameter is unknown or
    /// `T` is not its declared size.
    pub fn handle<'k, T: ShaderValue>(&self, key: impl Into<ParameterKey<'k>>) -> Result<ParameterHandle<T>, Error> {
        let parameter = self.layout.parameter(key)?;
        if parameter.size() != size_of::<T>() {
            return Err(Error::SizeMismatch {
                expected: parameter.size(),
                actual: size_of::<T>(),
            });
        }
        Ok(ParameterHandle::new(parameter.index(), self.layout.structural_hash()))
    }

    fn handle_parameter<T>(&self, handle: ParameterHandle<T>) -> &ParameterBinding {
        assert_eq!(
            handle.layout_hash(),
            self.layout.structural_hash(),
            "parameter handle used on constant buffer {} with a different layout",
            self.layout.name()
        );
        &self.layout.parameters()[handle.index()]
    }

    /// Writes through a handle from [`handle`](Self::handle).
    ///
    /// # Panics
    ///
    /// If the handle was resolved against a buffer with a different layout.
    pub fn write<T: ShaderValue>(&mut self, handle: ParameterHandle<T>, value: &T) {
        let offset = self.handle_parameter(handle).offset();
        self.store
            .write(offset, crate::bindings::buffer_types::bytes_of(value))
            .expect("handle range validated with the layout");
        self.dirty = true;
    }

    /// Reads through a handle from [`handle`](Self::handle).
    ///
    /// # Panics
    ///
    /// If the handle was resolved against a buffer with a different layout.
    pub fn read<T: ShaderValue>(&self, handle: ParameterHandle<T>) -> T {
        let parameter = self.handle_parameter(handle);
        let bytes = self
            .store
            .read(parameter.offset(), size_of::<T>())
            .expect("handle range validated with the layout");
        crate::bindings::buffer_types::read_value(bytes)
    }

    /**
    Uploads the CPU mirror if it changed since the last successful upload.

    The whole store goes to the GPU in one transfer.  On failure the buffer stays dirty so the next
    call tries again.  Returns whether an upload happened.
    */
    pub fn update(&mut self) -> Result<bool, Error> {
        if !self.dirty {
            return Ok(false);
        }
        match self
            .device
            .upload_constant_buffer(&self.gpu, self.store.as_bytes())
        {
            Ok(()) => {
                self.dirty = false;
                logwise::trace_sync!(
                    "uploaded constant buffer {name} ({size} bytes)",
                    name = logwise::privacy::LogIt(self.layout.name()),
                    size = self.store.len()
                );
                Ok(true)
            }
            Err(e) => {
                logwise::warn_sync!(
                    "upload of constant buffer {name} failed: {err}",
                    name = logwise::privacy::LogIt(self.layout.name()),
                    err = logwise::privacy::LogIt(&e)
                );
                Err(Error::DeviceResourceCreationFailure(e))
            }
        }
    }

    /// Copies this buffer's CPU mirror into `other` and marks `other` dirty.
    ///
    /// The sizes must match; on a mismatch `other` is left untouched and its dirty flag unchanged.
    /// The GPU buffers are not involved.
    pub fn copy_to(&self, other: &mut ConstantBuffer<D>) -> Result<(), Error> {
        other.store.copy_from(&self.store)?;
        other.dirty = true;
        Ok(())
    }
}

impl<D: BoundDevice> PartialEq for ConstantBuffer<D> {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
    }
}
impl<D: BoundDevice> Eq for ConstantBuffer<D> {}

impl<D: BoundDevice> Hash for ConstantBuffer<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.layout.hash(state);
    }
}

impl<D: BoundDevice> Debug for ConstantBuffer<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantBuffer")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("dirty", &self.dirty)
            .field("gpu", &self.gpu)
            .finish()
    }
}
