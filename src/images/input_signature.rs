// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shader input signatures.
//!
//! An input layout is only valid for the shader whose input signature it was compiled against.
//! [`InputSignature`] carries that signature's bytecode, which is its identity, together with the
//! reflected input parameters that backends use to match vertex elements to shader locations.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::hashing::structural_hash;
use crate::images::vertex_layout::{ResolvedElement, VertexLayoutKey};

/// One input the vertex shader reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureParameter {
    pub(crate) semantic_name: String,
    pub(crate) semantic_index: u32,
    pub(crate) location: u32,
    pub(crate) components: u8,
}

impl SignatureParameter {
    /// Creates a parameter read at shader `location` with `components` components (1 to 4).
    pub fn new(semantic_name: impl Into<String>, semantic_index: u32, location: u32, components: u8) -> Self {
        SignatureParameter {
            semantic_name: semantic_name.into(),
            semantic_index,
            location,
            components,
        }
    }
    pub fn semantic_name(&self) -> &str {
        &self.semantic_name
    }
    pub fn semantic_index(&self) -> u32 {
        self.semantic_index
    }
    pub fn location(&self) -> u32 {
        self.location
    }
    pub fn components(&self) -> u8 {
        self.components
    }
}

#[derive(Debug)]
struct SignatureInner {
    bytecode: Box<[u8]>,
    parameters: Vec<SignatureParameter>,
    hash: u64,
}

/// The input signature of a vertex shader.
///
/// Cloning is cheap.  Two signatures are equal when their bytecode is equal; the parameter list is
/// derived from the bytecode by reflection and does not participate in identity.
#[derive(Debug, Clone)]
pub struct InputSignature {
    inner: Arc<SignatureInner>,
}

impl InputSignature {
    pub fn new(bytecode: impl Into<Box<[u8]>>, parameters: Vec<SignatureParameter>) -> Self {
        let bytecode = bytecode.into();
        let hash = structural_hash(&bytecode[..]);
        InputSignature {
            inner: Arc::new(SignatureInner {
                bytecode,
                parameters,
                hash,
            }),
        }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.inner.bytecode
    }

    pub fn parameters(&self) -> &[SignatureParameter] {
        &self.inner.parameters
    }

    /// The digest of the bytecode, computed once at construction.
    pub fn structural_hash(&self) -> u64 {
        self.inner.hash
    }

    /**
    Pairs every signature parameter with the layout element that feeds it.

    Semantic names compare case-insensitively.  Each parameter must be fed by exactly one element
    whose format has at least as many components as the shader reads.  Elements the shader does
    not read are ignored.  Each slot may be described once.  Backends call this before building
    their native layout object.
    */
    pub fn match_layout<'k>(
        &self,
        layout: &'k VertexLayoutKey,
    ) -> Result<Vec<(&SignatureParameter, &'k ResolvedElement)>, SignatureMismatch> {
        let buffers = layout.description().buffers();
        for (i, buffer) in buffers.iter().enumerate() {
            if buffers[..i].iter().any(|b| b.slot() == buffer.slot()) {
                return Err(SignatureMismatch::DuplicateSlot { slot: buffer.slot() });
            }
            if buffer.is_per_instance() && buffer.step_rate() == 0 {
                return Err(SignatureMismatch::ZeroStepRate { slot: buffer.slot() });
            }
        }
        let elements = layout.resolved_elements();
        for (i, a) in elements.iter().enumerate() {
            if elements[..i].iter().any(|b| b.same_semantic(a)) {
                return Err(SignatureMismatch::DuplicateSemantic {
                    semantic: a.semantic_name().to_string(),
                    index: a.semantic_index(),
                });
            }
        }
        let parameters = self.parameters();
        for (i, a) in parameters.iter().enumerate() {
            if parameters[..i].iter().any(|b| b.location == a.location) {
                return Err(SignatureMismatch::DuplicateLocation { location: a.location });
            }
        }
        let mut matched = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let element = elements
                .iter()
                .find(|e| {
                    e.semantic_index() == parameter.semantic_index
                        && e.semantic_name().eq_ignore_ascii_case(&parameter.semantic_name)
                })
                .ok_or_else(|| SignatureMismatch::MissingSemantic {
                    semantic: parameter.semantic_name.clone(),
                    index: parameter.semantic_index,
                })?;
            if element.format().components() < parameter.components {
                return Err(SignatureMismatch::TooFewComponents {
                    semantic: parameter.semantic_name.clone(),
                    index: parameter.semantic_index,
                    needed: parameter.components,
                    supplied: element.format().components(),
                });
            }
            matched.push((parameter, element));
        }
        Ok(matched)
    }
}

/// Why a vertex layout cannot feed a shader's input signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SignatureMismatch {
    #[error("slot {slot} is described more than once")]
    DuplicateSlot { slot: u32 },
    #[error("slot {slot} holds per-instance data with a step rate of 0")]
    ZeroStepRate { slot: u32 },
    #[error("duplicate semantic {semantic}{index}")]
    DuplicateSemantic { semantic: String, index: u32 },
    #[error("location {location} is read twice")]
    DuplicateLocation { location: u32 },
    #[error("no element supplies {semantic}{index}")]
    MissingSemantic { semantic: String, index: u32 },
    #[error("{semantic}{index} needs {needed} components but its element has {supplied}")]
    TooFewComponents {
        semantic: String,
        index: u32,
        needed: u8,
        supplied: u8,
    },
}

impl PartialEq for InputSignature {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.hash == other.inner.hash && self.inner.bytecode == other.inner.bytecode)
    }
}
impl Eq for InputSignature {}

impl Hash for InputSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.inner.hash);
    }
}
