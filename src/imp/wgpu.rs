// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

wgpu has no standalone input layout object; vertex layouts are part of the render pipeline.  Here a
compiled input layout is the owned data behind `wgpu::VertexBufferLayout`, already matched against
the shader's input locations, ready to be borrowed into a pipeline descriptor.
*/

mod bound_device;
mod buffer;
mod input_layout;

pub use bound_device::WgpuDevice;
pub use buffer::WgpuConstantBuffer;
pub use input_layout::WgpuInputLayout;
