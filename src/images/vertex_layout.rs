// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex buffer layout descriptions and their canonical keys.
//!
//! A [`VertexLayoutDescription`] says how the bytes in each bound vertex buffer map to shader
//! inputs: which slot, which semantics, which formats, at which offsets, and whether the data
//! advances per vertex or per instance.
//!
//! Descriptions are plain values and may be built anywhere.  Before they can be used to look up a
//! compiled input layout they are turned into a [`VertexLayoutKey`] with
//! [`VertexLayoutKey::canonicalize`].  Canonicalization goes through a process-wide registry, so
//! two structurally identical descriptions always produce the same key with the same dense id, no
//! matter which call site built them.
//!
//! # Example
//!
//! ```
//! use effect_binding::images::vertex_layout::{
//!     VertexBufferLayout, VertexElement, VertexFormat, VertexLayoutDescription, VertexLayoutKey,
//! };
//!
//! let description = VertexLayoutDescription::new()
//!     .with_buffer(
//!         VertexBufferLayout::new(0)
//!             .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3))
//!             .element(VertexElement::new("TEXCOORD", 0, VertexFormat::Float32x2)),
//!     )
//!     .with_buffer(
//!         VertexBufferLayout::new(1)
//!             .per_instance(1)
//!             .element(VertexElement::new("INSTANCE_COLOR", 0, VertexFormat::Unorm8x4)),
//!     );
//!
//! let a = VertexLayoutKey::canonicalize(&description);
//! let b = VertexLayoutKey::canonicalize(&description.clone());
//! assert_eq!(a, b);
//! assert_eq!(a.id(), b.id());
//! assert_eq!(a.stride(0), Some(20));
//! ```

use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use foldhash::HashMap;
use wasm_safe_mutex::Mutex;

use crate::bittricks::align_up_u32;
use crate::hashing::structural_hash;

/// The data type of one vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Float16x2,
    Float16x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
    Uint16x2,
    Uint16x4,
    Unorm16x2,
    Unorm16x4,
    Uint8x4,
    Unorm8x4,
    Snorm8x4,
}

impl VertexFormat {
    /// Size of one element in bytes.
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 | VertexFormat::Sint32x2 => 8,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 | VertexFormat::Sint32x4 => 16,
            VertexFormat::Float16x2 | VertexFormat::Uint16x2 | VertexFormat::Unorm16x2 => 4,
            VertexFormat::Float16x4 | VertexFormat::Uint16x4 | VertexFormat::Unorm16x4 => 8,
            VertexFormat::Uint8x4 | VertexFormat::Unorm8x4 | VertexFormat::Snorm8x4 => 4,
        }
    }

    /// Number of components the shader sees.
    pub const fn components(self) -> u8 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 1,
            VertexFormat::Float32x2
            | VertexFormat::Uint32x2
            | VertexFormat::Sint32x2
            | VertexFormat::Float16x2
            | VertexFormat::Uint16x2
            | VertexFormat::Unorm16x2 => 2,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 3,
            VertexFormat::Float32x4
            | VertexFormat::Uint32x4
            | VertexFormat::Sint32x4
            | VertexFormat::Float16x4
            | VertexFormat::Uint16x4
            | VertexFormat::Unorm16x4
            | VertexFormat::Uint8x4
            | VertexFormat::Unorm8x4
            | VertexFormat::Snorm8x4 => 4,
        }
    }
}

/// Where an element starts inside its vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementOffset {
    /// A fixed byte offset from the start of the vertex.
    Explicit(u32),
    /// Immediately after the previous element of the same slot.
    #[default]
    AppendAligned,
}

/// Whether a slot advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputClassification {
    #[default]
    PerVertex,
    PerInstance,
}

/// One attribute inside a vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexElement {
    semantic_name: Cow<'static, str>,
    semantic_index: u32,
    format: VertexFormat,
    offset: ElementOffset,
}

impl VertexElement {
    /// An element placed right after the previous one.
    pub fn new(semantic_name: impl Into<Cow<'static, str>>, semantic_index: u32, format: VertexFormat) -> Self {
        VertexElement {
            semantic_name: semantic_name.into(),
            semantic_index,
            format,
            offset: ElementOffset::AppendAligned,
        }
    }

    /// Places the element at a fixed byte offset instead.
    pub fn at_offset(mut self, offset: u32) -> Self {
        self.offset = ElementOffset::Explicit(offset);
        self
    }

    pub fn semantic_name(&self) -> &str {
        &self.semantic_name
    }
    pub fn semantic_index(&self) -> u32 {
        self.semantic_index
    }
    pub fn format(&self) -> VertexFormat {
        self.format
    }
    pub fn offset(&self) -> ElementOffset {
        self.offset
    }
}

/// Describes the layout of one vertex buffer slot.
///
/// Elements are listed in the order they appear in memory when their offsets are
/// [`ElementOffset::AppendAligned`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    slot: u32,
    elements: Vec<VertexElement>,
    classification: InputClassification,
    step_rate: u32,
}

impl VertexBufferLayout {
    /// Creates an empty per-vertex layout for `slot`.
    pub fn new(slot: u32) -> Self {
        VertexBufferLayout {
            slot,
            elements: Vec::new(),
            classification: InputClassification::PerVertex,
            step_rate: 0,
        }
    }

    /// Marks the slot as per-instance data advancing every `step_rate` instances.
    pub fn per_instance(mut self, step_rate: u32) -> Self {
        self.classification = InputClassification::PerInstance;
        self.step_rate = step_rate;
        self
    }

    /// Appends an element, builder style.
    pub fn element(mut self, element: VertexElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Shorthand for `element(VertexElement::new(..))`.
    pub fn append(self, semantic_name: impl Into<Cow<'static, str>>, semantic_index: u32, format: VertexFormat) -> Self {
        self.element(VertexElement::new(semantic_name, semantic_index, format))
    }

    /// Appends an element.
    pub fn add_element(&mut self, element: VertexElement) {
        self.elements.push(element);
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }
    pub fn classification(&self) -> InputClassification {
        self.classification
    }
    pub fn is_per_instance(&self) -> bool {
        self.classification == InputClassification::PerInstance
    }
    /// Instances drawn per step of the data.  Always 0 for per-vertex slots.
    pub fn step_rate(&self) -> u32 {
        self.step_rate
    }
}

/// All vertex buffer slots bound for one draw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayoutDescription {
    buffers: Vec<VertexBufferLayout>,
}

impl VertexLayoutDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// A description with a single slot.
    pub fn single(buffer: VertexBufferLayout) -> Self {
        VertexLayoutDescription {
            buffers: vec![buffer],
        }
    }

    pub fn with_buffer(mut self, buffer: VertexBufferLayout) -> Self {
        self.buffers.push(buffer);
        self
    }

    pub fn add_buffer(&mut self, buffer: VertexBufferLayout) {
        self.buffers.push(buffer);
    }

    pub fn buffers(&self) -> &[VertexBufferLayout] {
        &self.buffers
    }
}

/// An element with its offset resolved and its slot information attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    semantic_name: Cow<'static, str>,
    semantic_index: u32,
    format: VertexFormat,
    offset: u32,
    slot: u32,
    classification: InputClassification,
    step_rate: u32,
}

impl ResolvedElement {
    pub fn semantic_name(&self) -> &str {
        &self.semantic_name
    }
    pub fn semantic_index(&self) -> u32 {
        self.semantic_index
    }
    pub fn format(&self) -> VertexFormat {
        self.format
    }
    /// Byte offset from the start of the vertex.
    pub fn offset(&self) -> u32 {
        self.offset
    }
    pub fn slot(&self) -> u32 {
        self.slot
    }
    pub fn classification(&self) -> InputClassification {
        self.classification
    }
    pub fn step_rate(&self) -> u32 {
        self.step_rate
    }

    pub(crate) fn same_semantic(&self, other: &ResolvedElement) -> bool {
        self.semantic_index == other.semantic_index
            && self.semantic_name.eq_ignore_ascii_case(&other.semantic_name)
    }
}

fn resolve(description: &VertexLayoutDescription) -> (Vec<ResolvedElement>, Vec<(u32, u32)>) {
    let mut resolved = Vec::new();
    let mut strides = Vec::with_capacity(description.buffers.len());
    for buffer in &description.buffers {
        let mut cursor = 0u32;
        let mut stride = 0u32;
        for element in &buffer.elements {
            let size = element.format.size();
            let offset = match element.offset {
                ElementOffset::Explicit(offset) => offset,
                ElementOffset::AppendAligned => align_up_u32(cursor, size.min(4)),
            };
            cursor = offset.saturating_add(size);
            stride = stride.max(cursor);
            resolved.push(ResolvedElement {
                semantic_name: element.semantic_name.clone(),
                semantic_index: element.semantic_index,
                format: element.format,
                offset,
                slot: buffer.slot,
                classification: buffer.classification,
                step_rate: buffer.step_rate,
            });
        }
        strides.push((buffer.slot, stride));
    }
    (resolved, strides)
}

struct KeyInner {
    id: u32,
    hash: u64,
    description: VertexLayoutDescription,
    resolved: Vec<ResolvedElement>,
    strides: Vec<(u32, u32)>,
}

/// The canonical, immutable identity of a [`VertexLayoutDescription`].
///
/// Keys can only be obtained from [`canonicalize`](Self::canonicalize), so equal ids imply equal
/// content.  Equality and hashing use the id alone.  Cloning is cheap.
#[derive(Clone)]
pub struct VertexLayoutKey(Arc<KeyInner>);

struct LayoutRegistry {
    //structural hash -> every key with that hash, for content comparison on collision
    by_hash: HashMap<u64, Vec<VertexLayoutKey>>,
    next_id: u32,
}

static REGISTRY: LazyLock<Mutex<LayoutRegistry>> = LazyLock::new(|| {
    Mutex::new(LayoutRegistry {
        by_hash: HashMap::default(),
        next_id: 0,
    })
});

impl VertexLayoutKey {
    /**
    Returns the canonical key for `description`.

    If a structurally equal description was canonicalized before, anywhere in the process, its key
    is returned.  Otherwise a new key is registered with the next sequential id.  The registry lives
    for the whole process and only grows.
    */
    pub fn canonicalize(description: &VertexLayoutDescription) -> VertexLayoutKey {
        let hash = structural_hash(description);
        let mut registry = REGISTRY.lock_sync();
        if let Some(existing) = registry
            .by_hash
            .get(&hash)
            .and_then(|bucket| bucket.iter().find(|k| k.0.description == *description))
        {
            return existing.clone();
        }
        let id = registry.next_id;
        registry.next_id += 1;
        let (resolved, strides) = resolve(description);
        let key = VertexLayoutKey(Arc::new(KeyInner {
            id,
            hash,
            description: description.clone(),
            resolved,
            strides,
        }));
        registry.by_hash.entry(hash).or_default().push(key.clone());
        logwise::trace_sync!(
            "registered vertex layout {id} with {slots} slots",
            id = id,
            slots = description.buffers.len()
        );
        key
    }

    /// Number of distinct layouts registered so far in this process.
    pub fn registered_count() -> usize {
        REGISTRY.lock_sync().next_id as usize
    }

    /// The dense id, assigned in registration order.
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// The content digest the registry filed this key under.
    pub fn structural_hash(&self) -> u64 {
        self.0.hash
    }

    pub fn description(&self) -> &VertexLayoutDescription {
        &self.0.description
    }

    /// Every element of every slot, in declaration order, with offsets resolved.
    pub fn resolved_elements(&self) -> &[ResolvedElement] {
        &self.0.resolved
    }

    /// Bytes between consecutive vertices of `slot`, or `None` if the slot is not described.
    pub fn stride(&self, slot: u32) -> Option<u32> {
        self.0
            .strides
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, stride)| *stride)
    }
}

impl PartialEq for VertexLayoutKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for VertexLayoutKey {}

impl Hash for VertexLayoutKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.id);
    }
}

impl Debug for VertexLayoutKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexLayoutKey")
            .field("id", &self.0.id)
            .field("description", &self.0.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skinned(slot: u32) -> VertexBufferLayout {
        VertexBufferLayout::new(slot)
            .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3))
            .element(VertexElement::new("BLENDINDICES", 0, VertexFormat::Uint8x4))
            .element(VertexElement::new("BLENDWEIGHT", 0, VertexFormat::Float16x4))
    }

    #[test]
    fn identical_descriptions_share_a_key() {
        let a = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(skinned(0)));
        let b = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(skinned(0)));
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn different_descriptions_get_different_ids() {
        let a = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(skinned(0)));
        let b = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(skinned(1)));
        let c = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            skinned(0).per_instance(1),
        ));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b.id(), c.id());
        assert!(VertexLayoutKey::registered_count() >= 3);
    }

    #[test]
    fn append_aligned_offsets() {
        let key = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(skinned(3)));
        let offsets: Vec<u32> = key.resolved_elements().iter().map(|e| e.offset()).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(key.stride(3), Some(24));
        assert_eq!(key.stride(0), None);
        assert!(key.resolved_elements().iter().all(|e| e.slot() == 3));
    }

    #[test]
    fn explicit_offsets_and_append_after_them() {
        let key = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            VertexBufferLayout::new(0)
                .element(VertexElement::new("NORMAL", 0, VertexFormat::Float32x3).at_offset(16))
                .element(VertexElement::new("TEXCOORD", 0, VertexFormat::Float32x2))
                .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3).at_offset(0)),
        ));
        let offsets: Vec<u32> = key.resolved_elements().iter().map(|e| e.offset()).collect();
        assert_eq!(offsets, vec![16, 28, 0]);
        assert_eq!(key.stride(0), Some(36));
    }

    #[test]
    fn explicit_and_appended_are_structurally_distinct() {
        //the same bytes described two ways are two descriptions
        let appended = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            VertexBufferLayout::new(7)
                .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x2)),
        ));
        let explicit = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            VertexBufferLayout::new(7)
                .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x2).at_offset(0)),
        ));
        assert_ne!(appended, explicit);
        assert_eq!(appended.resolved_elements(), explicit.resolved_elements());
    }
}
