// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! effect_binding is the parameter and input-layout layer of a toolkit atop a native 3D API.

It covers the two places where a shader meets application data.

# Constant buffers

Shader reflection (performed elsewhere) describes each constant buffer of an effect.  From that
description, [`bindings::ConstantBuffer`] builds a CPU mirror of the buffer's bytes and a GPU
buffer to upload them into.  Parameters are written by name, by index, or through typed
[`bindings::ParameterHandle`]s; writes only touch the mirror and mark it dirty.  Before drawing,
`update()` uploads the whole mirror in one transfer, and only if something changed.

| Operation            | Touches the GPU | Marks dirty |
|----------------------|-----------------|-------------|
| `set`, `set_element` | no              | yes         |
| `get`                | no              | no          |
| `update`             | only if dirty   | clears      |
| `copy_to`            | no              | destination |

# Input layouts

A vertex layout description is canonicalized once into a [`images::VertexLayoutKey`].  Identical
descriptions share one key, with a dense id, for the life of the process.  Compiled input layouts
are cached per (shader input signature, key) in two tiers: a lock-free
[`images::ContextInputLayoutCache`] per rendering context, over one locked
[`images::DeviceInputLayoutCache`] per device that compiles each pair at most once.

# Backends

Both subsystems reach the GPU only through [`images::BoundDevice`].  The crate ships
[`SoftwareDevice`], an in-memory device for headless use, and, with the default `backend_wgpu`
feature on native targets, `WgpuDevice` on top of [wgpu](https://wgpu.rs).
*/

pub mod images;
pub mod bindings;
mod imp;
mod bittricks;
mod hashing;
mod error;

pub use error::Error;
pub use imp::software::{SoftwareAttribute, SoftwareConstantBuffer, SoftwareDevice, SoftwareInputLayout};
#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub use imp::wgpu::{WgpuConstantBuffer, WgpuDevice, WgpuInputLayout};

pub use half;
