// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Constant buffer bindings: reflected layouts, CPU mirrors and their GPU uploads */

pub mod buffer_types;
pub mod packed_store;
pub mod reflection;
pub mod parameter;
pub mod constant_buffer;
pub mod effect_buffers;

pub use constant_buffer::{ConstantBuffer, ConstantBufferLayout};
pub use effect_buffers::EffectConstantBuffers;
pub use parameter::{ParameterBinding, ParameterHandle, ParameterKey};
