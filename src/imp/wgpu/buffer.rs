// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Constant buffers for the wgpu backend.
//!
//! The CPU mirror lives in [`ConstantBuffer`](crate::bindings::constant_buffer::ConstantBuffer);
//! this side only owns the `UNIFORM | COPY_DST` buffer and writes the whole mirror into it with
//! `Queue::write_buffer`, which wgpu stages and schedules before the next submission.

use std::borrow::Cow;

use wgpu::{BufferDescriptor, BufferUsages};

use crate::bittricks::align_up;
use crate::images::device::DeviceError;

//uniform bindings are sized in 16-byte registers
const UNIFORM_ALIGNMENT: usize = 16;

/**
GPU-side storage of a constant buffer.
*/
#[derive(Debug)]
pub struct WgpuConstantBuffer {
    buffer: wgpu::Buffer,
    byte_len: usize,
}

impl WgpuConstantBuffer {
    pub(super) fn new(
        device: &wgpu::Device,
        byte_len: usize,
        debug_name: &str,
    ) -> Result<Self, DeviceError> {
        let allocated_size = align_up(byte_len.max(1), UNIFORM_ALIGNMENT);
        let max = device.limits().max_uniform_buffer_binding_size as usize;
        if allocated_size > max {
            return Err(DeviceError::ResourceCreation(format!(
                "{debug_name} needs {allocated_size} bytes, the device binds at most {max}"
            )));
        }
        let descriptor = BufferDescriptor {
            label: Some(debug_name),
            size: allocated_size as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        };
        let buffer = device.create_buffer(&descriptor);
        logwise::info_sync!(
            "created constant buffer {name} ({size} bytes)",
            name = logwise::privacy::LogIt(debug_name),
            size = allocated_size
        );
        Ok(WgpuConstantBuffer { buffer, byte_len })
    }

    /// The buffer to put in a bind group.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Size of the CPU mirror; the allocation may be larger.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub(super) fn upload(&self, queue: &wgpu::Queue, data: &[u8]) -> Result<(), DeviceError> {
        if data.len() > self.byte_len {
            return Err(DeviceError::Upload(format!(
                "{} bytes do not fit in a {} byte constant buffer",
                data.len(),
                self.byte_len
            )));
        }
        //write_buffer wants COPY_BUFFER_ALIGNMENT-sized writes; the allocation has room for the padding
        let padded_len = align_up(data.len(), wgpu::COPY_BUFFER_ALIGNMENT as usize);
        let data: Cow<'_, [u8]> = if padded_len == data.len() {
            Cow::Borrowed(data)
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len, 0);
            Cow::Owned(padded)
        };
        queue.write_buffer(&self.buffer, 0, &data);
        Ok(())
    }
}
