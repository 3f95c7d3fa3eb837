// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory device.

[`SoftwareDevice`] implements [`BoundDevice`] without a GPU.  Constant buffers are byte vectors
and input layouts are validated attribute tables.  It counts every operation it performs, and it
can pretend to be lost, which makes it the device of choice for headless tools and tests.
*/

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use wasm_safe_mutex::Mutex;

use crate::images::device::{BoundDevice, DeviceError};
use crate::images::input_signature::InputSignature;
use crate::images::vertex_layout::{VertexFormat, VertexLayoutKey};

/// A device that lives entirely in CPU memory.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    lost: AtomicBool,
    buffers_created: AtomicUsize,
    uploads: AtomicUsize,
    compiles: AtomicUsize,
    compile_delay: Duration,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose input layout compiles take at least `delay`.  Useful to widen races.
    pub fn with_compile_delay(delay: Duration) -> Self {
        SoftwareDevice {
            compile_delay: delay,
            ..Self::default()
        }
    }

    /// Simulates device loss (or recovery).  A lost device fails every operation.
    pub fn set_lost(&self, lost: bool) {
        self.lost.store(lost, Ordering::Relaxed);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Relaxed)
    }

    /// Constant buffers created so far.
    pub fn buffers_created(&self) -> usize {
        self.buffers_created.load(Ordering::Relaxed)
    }

    /// Successful constant buffer uploads so far.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }

    /// Input layout compiles attempted so far, including rejected ones.
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    fn check_lost(&self) -> Result<(), DeviceError> {
        if self.is_lost() {
            Err(DeviceError::Lost)
        } else {
            Ok(())
        }
    }
}

/// GPU-side storage of a [`SoftwareDevice`] constant buffer.
#[derive(Debug)]
pub struct SoftwareConstantBuffer {
    debug_name: String,
    contents: Mutex<Vec<u8>>,
}

impl SoftwareConstantBuffer {
    /// A copy of what was last uploaded.  Zeroed before the first upload.
    pub fn contents(&self) -> Vec<u8> {
        self.contents.lock_sync().clone()
    }

    pub fn byte_len(&self) -> usize {
        self.contents.lock_sync().len()
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

/// One shader input fed by a vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareAttribute {
    pub location: u32,
    pub slot: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

/// An input layout compiled by a [`SoftwareDevice`].
#[derive(Debug)]
pub struct SoftwareInputLayout {
    layout_id: u32,
    attributes: Vec<SoftwareAttribute>,
}

impl SoftwareInputLayout {
    /// Id of the vertex layout this was compiled from.
    pub fn layout_id(&self) -> u32 {
        self.layout_id
    }

    /// Attributes ordered by shader location.
    pub fn attributes(&self) -> &[SoftwareAttribute] {
        &self.attributes
    }
}

impl BoundDevice for SoftwareDevice {
    type ConstantBuffer = SoftwareConstantBuffer;
    type InputLayout = SoftwareInputLayout;

    fn create_constant_buffer(
        &self,
        byte_len: usize,
        debug_name: &str,
    ) -> Result<Self::ConstantBuffer, DeviceError> {
        self.check_lost()?;
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareConstantBuffer {
            debug_name: debug_name.to_string(),
            contents: Mutex::new(vec![0; byte_len]),
        })
    }

    fn upload_constant_buffer(
        &self,
        buffer: &Self::ConstantBuffer,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        self.check_lost()?;
        let mut contents = buffer.contents.lock_sync();
        if data.len() > contents.len() {
            return Err(DeviceError::Upload(format!(
                "{} bytes do not fit in {} ({} bytes)",
                data.len(),
                buffer.debug_name,
                contents.len()
            )));
        }
        contents[..data.len()].copy_from_slice(data);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn compile_input_layout(
        &self,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Self::InputLayout, DeviceError> {
        self.compiles.fetch_add(1, Ordering::Relaxed);
        self.check_lost()?;
        if !self.compile_delay.is_zero() {
            std::thread::sleep(self.compile_delay);
        }
        let matched = signature.match_layout(layout)?;
        let mut attributes: Vec<SoftwareAttribute> = matched
            .into_iter()
            .map(|(parameter, element)| SoftwareAttribute {
                location: parameter.location(),
                slot: element.slot(),
                offset: element.offset(),
                format: element.format(),
            })
            .collect();
        attributes.sort_by_key(|a| a.location);
        Ok(SoftwareInputLayout {
            layout_id: layout.id(),
            attributes,
        })
    }
}
