// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Errors reported by the binding and layout caching layers.

use crate::images::device::DeviceError;

/// Errors returned by constant-buffer and input-layout operations.
///
/// None of these are retried internally.  A failing call leaves the CPU mirror and the caches
/// exactly as they were before the call.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Byte sizes disagree, e.g. a value whose size differs from the parameter's declared size,
    /// or a [`copy_to`](crate::bindings::constant_buffer::ConstantBuffer::copy_to) between
    /// buffers of different sizes.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// No parameter with this name (or index, rendered as `#n`) exists.
    #[error("unknown parameter {0}")]
    UnknownParameter(String),

    /// No constant buffer with this name exists in the effect.
    #[error("unknown constant buffer {0}")]
    UnknownConstantBuffer(String),

    /// An array element index past the parameter's element count.
    #[error("element {index} out of range for {parameter} ({count} elements)")]
    ElementOutOfRange {
        parameter: String,
        index: usize,
        count: usize,
    },

    /// The parameter exists, but its type tag does not support the operation.
    #[error("parameter {parameter} is not a {expected}")]
    TypeMismatch {
        parameter: String,
        expected: &'static str,
    },

    /// A raw read or write past the end of a packed store.
    #[error("range {offset}..{offset}+{len} exceeds store of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// A reflected description is internally inconsistent.
    #[error("invalid constant buffer layout: {0}")]
    InvalidLayout(String),

    /// Two constant buffer sets that were expected to be structurally equal are not.
    #[error("layout mismatch: expected {expected}, got {actual}")]
    LayoutMismatch { expected: String, actual: String },

    /// The device rejected a (signature, vertex layout) pair.
    #[error("failed to compile input layout for vertex layout #{layout}")]
    LayoutCompileFailure {
        layout: u32,
        #[source]
        source: DeviceError,
    },

    /// The device failed to create or update a resource.
    #[error("device resource failure")]
    DeviceResourceCreationFailure(#[source] DeviceError),
}
