// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! All constant buffers of one effect.

use std::sync::Arc;

use foldhash::HashMap;

use crate::bindings::buffer_types::ShaderValue;
use crate::bindings::constant_buffer::ConstantBuffer;
use crate::bindings::parameter::ParameterBinding;
use crate::bindings::reflection::ConstantBufferDescription;
use crate::error::Error;
use crate::images::device::BoundDevice;

/**
The constant buffers of an effect, built from reflection.

Parameters can be addressed through their buffer, or effect-wide by name with
[`set_parameter`](Self::set_parameter).  When the same name is declared in several buffers, the
first buffer in declaration order wins.
*/
#[derive(Debug)]
pub struct EffectConstantBuffers<D: BoundDevice> {
    buffers: Vec<ConstantBuffer<D>>,
    by_name: HashMap<String, usize>,
}

impl<D: BoundDevice> EffectConstantBuffers<D> {
    /// Creates one [`ConstantBuffer`] per description.  Buffer names must be unique.
    pub fn new(
        device: &Arc<D>,
        descriptions: impl IntoIterator<Item = ConstantBufferDescription>,
    ) -> Result<Self, Error> {
        let mut buffers = Vec::new();
        let mut by_name = HashMap::default();
        for description in descriptions {
            if by_name.contains_key(description.name()) {
                return Err(Error::InvalidLayout(format!(
                    "constant buffer {} is declared twice",
                    description.name()
                )));
            }
            by_name.insert(description.name().to_string(), buffers.len());
            buffers.push(ConstantBuffer::new(device, description)?);
        }
        logwise::info_sync!(
            "created {count} constant buffers for effect",
            count = buffers.len()
        );
        Ok(EffectConstantBuffers { buffers, by_name })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffers in declaration order.
    pub fn buffers(&self) -> &[ConstantBuffer<D>] {
        &self.buffers
    }

    pub fn buffer(&self, name: &str) -> Result<&ConstantBuffer<D>, Error> {
        self.by_name
            .get(name)
            .map(|index| &self.buffers[*index])
            .ok_or_else(|| Error::UnknownConstantBuffer(name.to_string()))
    }

    pub fn buffer_mut(&mut self, name: &str) -> Result<&mut ConstantBuffer<D>, Error> {
        match self.by_name.get(name) {
            Some(index) => Ok(&mut self.buffers[*index]),
            None => Err(Error::UnknownConstantBuffer(name.to_string())),
        }
    }

    fn owner(&self, parameter: &str) -> Result<usize, Error> {
        self.buffers
            .iter()
            .position(|buffer| buffer.parameter(parameter).is_ok())
            .ok_or_else(|| Error::UnknownParameter(parameter.to_string()))
    }

    /// Finds a parameter in any buffer.  Returns the owning buffer with the binding.
    pub fn find_parameter(&self, name: &str) -> Result<(&ConstantBuffer<D>, &ParameterBinding), Error> {
        let buffer = &self.buffers[self.owner(name)?];
        Ok((buffer, buffer.parameter(name)?))
    }

    /// Sets a parameter wherever it is declared.
    pub fn set_parameter<T: ShaderValue>(&mut self, name: &str, value: &T) -> Result<(), Error> {
        let owner = self.owner(name)?;
        self.buffers[owner].set(name, value)
    }

    pub fn get_parameter<T: ShaderValue>(&self, name: &str) -> Result<T, Error> {
        self.buffers[self.owner(name)?].get(name)
    }

    pub fn is_dirty(&self) -> bool {
        self.buffers.iter().any(ConstantBuffer::is_dirty)
    }

    /**
    Uploads every dirty buffer, once each, and returns how many were uploaded.

    Stops at the first failure.  Buffers uploaded before it are clean; the failing buffer and the
    ones after it stay dirty.
    */
    pub fn update_all(&mut self) -> Result<usize, Error> {
        let mut uploaded = 0;
        for buffer in &mut self.buffers {
            if buffer.update()? {
                uploaded += 1;
            }
        }
        Ok(uploaded)
    }

    /// Copies every buffer's contents into the matching buffer of `other`.
    ///
    /// Both effects must have structurally equal buffers in the same order; otherwise nothing is
    /// copied and [`Error::LayoutMismatch`] is returned.
    pub fn copy_to(&self, other: &mut EffectConstantBuffers<D>) -> Result<(), Error> {
        let same = self.buffers.len() == other.buffers.len()
            && self.buffers.iter().zip(&other.buffers).all(|(a, b)| a == b);
        if !same {
            return Err(Error::LayoutMismatch {
                expected: self.describe(),
                actual: other.describe(),
            });
        }
        for (source, destination) in self.buffers.iter().zip(&mut other.buffers) {
            source.copy_to(destination)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self
            .buffers
            .iter()
            .map(|b| format!("{}({})", b.name(), b.size()))
            .collect();
        format!("[{}]", names.join(", "))
    }
}
