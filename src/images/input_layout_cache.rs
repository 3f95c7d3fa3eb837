// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Two-tier cache of compiled input layouts.

Compiling an input layout pairs a [`VertexLayoutKey`] with a shader's [`InputSignature`], and is
far too expensive to do per draw.  Compiled layouts are cached in two tiers:

- [`DeviceInputLayoutCache`] is shared by every rendering context of a device.  It is the source of
  truth and is guarded by a single lock.  Lookup and compile-and-insert happen under that lock, so
  concurrent first accesses from several contexts still compile each (signature, layout) pair once.
- [`ContextInputLayoutCache`] belongs to one rendering context and is never shared.  It needs no
  synchronization, so the common case of drawing the same shader and vertex format repeatedly from
  one context never touches the lock.

Entries are never evicted.  When the device is recreated, the owner calls
[`DeviceInputLayoutCache::clear`]; context caches notice on their next lookup and drop their
entries too.

# Example

```
use std::sync::Arc;
use effect_binding::SoftwareDevice;
use effect_binding::images::input_layout_cache::{ContextInputLayoutCache, DeviceInputLayoutCache};
use effect_binding::images::input_signature::{InputSignature, SignatureParameter};
use effect_binding::images::vertex_layout::*;

let device = Arc::new(SoftwareDevice::new());
let device_cache = Arc::new(DeviceInputLayoutCache::new(device.clone()));
let mut context = ContextInputLayoutCache::new(device_cache.clone());

let signature = InputSignature::new(vec![0x44, 0x58, 0x42, 0x43], vec![
    SignatureParameter::new("POSITION", 0, 0, 3),
]);
let key = VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
    VertexBufferLayout::new(0).element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3)),
));

let first = context.get_or_create(&signature, &key).unwrap();
let second = context.get_or_create(&signature, &key).unwrap();
assert!(Arc::ptr_eq(&first, &second));
assert_eq!(device.compiles(), 1);
```
*/

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use foldhash::HashMap;
use wasm_safe_mutex::Mutex;

use crate::error::Error;
use crate::images::device::BoundDevice;
use crate::images::input_signature::InputSignature;
use crate::images::vertex_layout::VertexLayoutKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    signature: InputSignature,
    layout: VertexLayoutKey,
}

/// The device-wide tier.  Share it between contexts with an `Arc`.
pub struct DeviceInputLayoutCache<D: BoundDevice> {
    device: Arc<D>,
    entries: Mutex<HashMap<CacheKey, Arc<D::InputLayout>>>,
    //bumped by clear(); contexts compare against it before trusting their entries
    generation: AtomicU64,
}

impl<D: BoundDevice> DeviceInputLayoutCache<D> {
    pub fn new(device: Arc<D>) -> Self {
        DeviceInputLayoutCache {
            device,
            entries: Mutex::new(HashMap::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /**
    Returns the compiled layout for (`signature`, `layout`), compiling it on first use.

    This always takes the lock; rendering code should go through a [`ContextInputLayoutCache`]
    instead.  On a compile failure nothing is cached and the error is returned as
    [`Error::LayoutCompileFailure`].
    */
    pub fn get_or_create(
        &self,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Arc<D::InputLayout>, Error> {
        let key = CacheKey {
            signature: signature.clone(),
            layout: layout.clone(),
        };
        let mut entries = self.entries.lock_sync();
        if let Some(found) = entries.get(&key) {
            return Ok(found.clone());
        }
        logwise::trace_sync!(
            "input layout miss for vertex layout {layout}",
            layout = layout.id()
        );
        let compile = logwise::perfwarn_begin!("compile_input_layout");
        let compiled = self.device.compile_input_layout(signature, layout);
        drop(compile);
        match compiled {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                entries.insert(key, compiled.clone());
                logwise::info_sync!(
                    "compiled input layout for vertex layout {layout}, {count} cached",
                    layout = layout.id(),
                    count = entries.len()
                );
                Ok(compiled)
            }
            Err(source) => {
                logwise::warn_sync!(
                    "input layout for vertex layout {layout} rejected: {err}",
                    layout = layout.id(),
                    err = logwise::privacy::LogIt(&source)
                );
                Err(Error::LayoutCompileFailure {
                    layout: layout.id(),
                    source,
                })
            }
        }
    }

    /// Number of compiled layouts held by the device tier.
    pub fn len(&self) -> usize {
        self.entries.lock_sync().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every compiled layout, in this tier and, lazily, in every context tier.
    ///
    /// Call after the device has been recreated; layouts compiled on the old device are not valid
    /// on the new one.
    pub fn clear(&self) {
        let mut entries = self.entries.lock_sync();
        entries.clear();
        self.generation.fetch_add(1, Ordering::Release);
        logwise::info_sync!("cleared device input layout cache");
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl<D: BoundDevice> Debug for DeviceInputLayoutCache<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInputLayoutCache")
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

type ContextBucket<L> = Vec<(InputSignature, Arc<L>)>;

/// The per-context tier.
///
/// Owned by one rendering context and accessed through `&mut self`, so lookups need no lock.
pub struct ContextInputLayoutCache<D: BoundDevice> {
    device_cache: Arc<DeviceInputLayoutCache<D>>,
    generation: u64,
    //(signature digest, layout id) -> signatures sharing that slot
    entries: HashMap<(u64, u32), ContextBucket<D::InputLayout>>,
}

impl<D: BoundDevice> ContextInputLayoutCache<D> {
    pub fn new(device_cache: Arc<DeviceInputLayoutCache<D>>) -> Self {
        let generation = device_cache.generation();
        ContextInputLayoutCache {
            device_cache,
            generation,
            entries: HashMap::default(),
        }
    }

    pub fn device_cache(&self) -> &Arc<DeviceInputLayoutCache<D>> {
        &self.device_cache
    }

    /**
    Returns the compiled layout for (`signature`, `layout`).

    A hit in this context returns without locking.  A miss falls through to the device tier, which
    either finds the layout compiled by another context or compiles it, and the result is
    remembered here.
    */
    pub fn get_or_create(
        &mut self,
        signature: &InputSignature,
        layout: &VertexLayoutKey,
    ) -> Result<Arc<D::InputLayout>, Error> {
        //read before touching the device tier, so a concurrent clear() is seen on the next call
        let generation = self.device_cache.generation();
        if generation != self.generation {
            self.entries.clear();
            self.generation = generation;
        }
        let slot = (signature.structural_hash(), layout.id());
        if let Some((_, found)) = self
            .entries
            .get(&slot)
            .and_then(|bucket| bucket.iter().find(|(s, _)| s == signature))
        {
            return Ok(found.clone());
        }
        let compiled = self.device_cache.get_or_create(signature, layout)?;
        self.entries
            .entry(slot)
            .or_default()
            .push((signature.clone(), compiled.clone()));
        Ok(compiled)
    }

    /// Number of layouts this context can return without locking.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: BoundDevice> Debug for ContextInputLayoutCache<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextInputLayoutCache")
            .field("len", &self.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SoftwareDevice;
    use crate::images::input_signature::SignatureParameter;
    use crate::images::vertex_layout::{
        VertexBufferLayout, VertexElement, VertexFormat, VertexLayoutDescription,
    };

    fn caches() -> (
        Arc<SoftwareDevice>,
        Arc<DeviceInputLayoutCache<SoftwareDevice>>,
    ) {
        let device = Arc::new(SoftwareDevice::new());
        let cache = Arc::new(DeviceInputLayoutCache::new(device.clone()));
        (device, cache)
    }

    fn signature(bytes: &[u8]) -> InputSignature {
        InputSignature::new(
            bytes.to_vec(),
            vec![
                SignatureParameter::new("POSITION", 0, 0, 3),
                SignatureParameter::new("TEXCOORD", 0, 1, 2),
            ],
        )
    }

    fn key() -> VertexLayoutKey {
        VertexLayoutKey::canonicalize(&VertexLayoutDescription::single(
            VertexBufferLayout::new(0)
                .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3))
                .element(VertexElement::new("TEXCOORD", 0, VertexFormat::Float32x2)),
        ))
    }

    #[test]
    fn context_hit_skips_device() {
        let (device, cache) = caches();
        let mut context = ContextInputLayoutCache::new(cache.clone());
        let sig = signature(b"vs_main");
        let a = context.get_or_create(&sig, &key()).unwrap();
        let b = context.get_or_create(&sig, &key()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.compiles(), 1);
        assert_eq!(context.len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn second_context_reuses_device_entry() {
        let (device, cache) = caches();
        let mut first = ContextInputLayoutCache::new(cache.clone());
        let mut second = ContextInputLayoutCache::new(cache.clone());
        let sig = signature(b"vs_shared");
        let a = first.get_or_create(&sig, &key()).unwrap();
        assert!(second.is_empty());
        let b = second.get_or_create(&sig, &key()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.compiles(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn distinct_signatures_compile_separately() {
        let (device, cache) = caches();
        let mut context = ContextInputLayoutCache::new(cache.clone());
        let a = context.get_or_create(&signature(b"vs_a"), &key()).unwrap();
        let b = context.get_or_create(&signature(b"vs_b"), &key()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(device.compiles(), 2);
        //an equal signature built elsewhere hits
        let c = context.get_or_create(&signature(b"vs_a"), &key()).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(device.compiles(), 2);
    }

    #[test]
    fn compile_failure_is_not_cached() {
        let (device, cache) = caches();
        let mut context = ContextInputLayoutCache::new(cache.clone());
        let needs_normal = InputSignature::new(
            b"vs_lit".to_vec(),
            vec![SignatureParameter::new("NORMAL", 0, 0, 3)],
        );
        for _ in 0..2 {
            match context.get_or_create(&needs_normal, &key()) {
                Err(Error::LayoutCompileFailure { layout, .. }) => assert_eq!(layout, key().id()),
                other => panic!("expected compile failure, got {other:?}"),
            }
        }
        assert_eq!(device.compiles(), 2);
        assert!(cache.is_empty());
        assert!(context.is_empty());
    }

    #[test]
    fn slot_described_twice_is_not_cached() {
        let (_, cache) = caches();
        let mut context = ContextInputLayoutCache::new(cache.clone());
        let overlapping = VertexLayoutKey::canonicalize(
            &VertexLayoutDescription::new()
                .with_buffer(
                    VertexBufferLayout::new(0)
                        .element(VertexElement::new("POSITION", 0, VertexFormat::Float32x3)),
                )
                .with_buffer(
                    VertexBufferLayout::new(0)
                        .element(VertexElement::new("TEXCOORD", 0, VertexFormat::Float32x2)),
                ),
        );
        assert!(matches!(
            context.get_or_create(&signature(b"vs_overlap"), &overlapping),
            Err(Error::LayoutCompileFailure { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_invalidates_contexts() {
        let (device, cache) = caches();
        let mut context = ContextInputLayoutCache::new(cache.clone());
        let sig = signature(b"vs_clear");
        let before = context.get_or_create(&sig, &key()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        let after = context.get_or_create(&sig, &key()).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(device.compiles(), 2);
        assert_eq!(context.len(), 1);
    }
}
