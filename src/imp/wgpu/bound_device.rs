// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::images::device::{BoundDevice, DeviceError};
use crate::images::input_signature::InputSignature;
use crate::images::vertex_layout::VertexLayoutKey;
use crate::imp::wgpu::buffer::WgpuConstantBuffer;
use crate::imp::wgpu::input_layout::WgpuInputLayout;

/// A [`BoundDevice`] backed by a wgpu device and its queue.
///
/// The caller creates the device; this type only borrows it for constant buffers and input
/// layouts.  Cloning a wgpu device or queue is cheap, so the caller can keep its own handles.
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuDevice { device, queue }
    }

    /// Access to the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access to the wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl BoundDevice for WgpuDevice {
    type ConstantBuffer = WgpuConstantBuffer;
    type InputLayout = WgpuInputLayout;

    fn create_constant_buffer(
        &self,
        byte_len: usize,
        debug_name: &str,
    ) -> Result<Self::ConstantBuffer, DeviceError> {
        WgpuConstantBuffer::new(&self.device, byte_len, debug_name)
    }

    fn upload_constant_buffer(
        &self,
        buffer: &Self::ConstantBuffer,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        buffer.upload(&self.queue, data)
    }

    fn compile_input_layout(
        &self,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Self::InputLayout, DeviceError> {
        WgpuInputLayout::compile(&self.device.limits(), signature, layout)
    }
}
