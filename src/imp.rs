// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//the software device is always built; wgpu is optional

pub(crate) mod software;

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub(crate) mod wgpu;
