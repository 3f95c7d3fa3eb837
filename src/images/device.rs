// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The device collaborator.
//!
//! Constant buffers and the input layout cache never talk to a graphics API directly.  Instead they
//! go through [`BoundDevice`], which exposes exactly three operations: create a GPU constant buffer,
//! upload bytes into it, and compile an input layout.  Everything else about the device (creation,
//! surfaces, loss and recreation) belongs to the caller.
//!
//! Two implementations ship with the crate:
//!
//! - [`SoftwareDevice`](crate::SoftwareDevice), an in-memory device that records what it was asked
//!   to do.  It is always available.
//! - `WgpuDevice`, available with the `backend_wgpu` feature on native targets.

use std::fmt::Debug;

use crate::images::input_signature::{InputSignature, SignatureMismatch};
use crate::images::vertex_layout::VertexLayoutKey;

/// Errors raised by a [`BoundDevice`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DeviceError {
    /// The device is gone; nothing can be created or uploaded until it is recreated.
    #[error("device lost")]
    Lost,
    /// A GPU resource could not be allocated.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),
    /// Bytes could not be transferred to a GPU resource.
    #[error("upload failed: {0}")]
    Upload(String),
    /// The device rejected a vertex layout for a shader signature.
    #[error("input layout rejected: {0}")]
    InputLayout(String),
    /// The vertex layout does not feed the shader's input signature.
    #[error("input layout rejected: {0}")]
    Signature(#[from] SignatureMismatch),
}

/// A device that constant buffers and input layouts can be created on.
///
/// Implementations are shared between rendering contexts, so they must be `Send + Sync`.  Every
/// operation is synchronous and either succeeds or reports a [`DeviceError`].
pub trait BoundDevice: Send + Sync + 'static {
    /// GPU-side storage for one constant buffer.
    type ConstantBuffer: Debug + Send;
    /// A compiled input layout.  Shared between contexts behind an `Arc`.
    type InputLayout: Debug + Send + Sync;

    /// Creates a GPU constant buffer able to hold `byte_len` bytes.
    fn create_constant_buffer(
        &self,
        byte_len: usize,
        debug_name: &str,
    ) -> Result<Self::ConstantBuffer, DeviceError>;

    /// Replaces the contents of `buffer` with `data`, starting at offset 0, in one transfer.
    fn upload_constant_buffer(
        &self,
        buffer: &Self::ConstantBuffer,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    /// Compiles an input layout binding `layout` to the inputs of `signature`.
    fn compile_input_layout(
        &self,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Self::InputLayout, DeviceError>;
}
