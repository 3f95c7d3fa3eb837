// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The vertex input side: layout keys, shader signatures and the input layout cache */

pub mod device;
pub mod vertex_layout;
pub mod input_signature;
pub mod input_layout_cache;

pub use device::{BoundDevice, DeviceError};
pub use input_layout_cache::{ContextInputLayoutCache, DeviceInputLayoutCache};
pub use input_signature::InputSignature;
pub use vertex_layout::VertexLayoutKey;
