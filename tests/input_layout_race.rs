//! Concurrent first use of the input layout cache from two rendering contexts.
#![cfg(not(target_arch = "wasm32"))]

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use effect_binding::SoftwareDevice;
use effect_binding::images::input_signature::{InputSignature, SignatureParameter};
use effect_binding::images::vertex_layout::{
    VertexBufferLayout, VertexFormat, VertexLayoutDescription, VertexLayoutKey,
};
use effect_binding::images::{ContextInputLayoutCache, DeviceInputLayoutCache};

fn description() -> VertexLayoutDescription {
    VertexLayoutDescription::new()
        .with_buffer(
            VertexBufferLayout::new(0)
                .append("POSITION", 0, VertexFormat::Float32x3)
                .append("NORMAL", 0, VertexFormat::Float32x3),
        )
        .with_buffer(
            VertexBufferLayout::new(1)
                .per_instance(1)
                .append("COLOR", 0, VertexFormat::Unorm8x4),
        )
}

fn signature() -> InputSignature {
    InputSignature::new(
        b"race_vs".to_vec(),
        vec![
            SignatureParameter::new("POSITION", 0, 0, 3),
            SignatureParameter::new("NORMAL", 0, 1, 3),
            SignatureParameter::new("COLOR", 0, 2, 4),
        ],
    )
}

#[test]
fn independently_built_layouts_share_a_key() {
    let a = thread::spawn(|| VertexLayoutKey::canonicalize(&description()));
    let b = thread::spawn(|| VertexLayoutKey::canonicalize(&description()));
    let a = a.join().unwrap();
    let b = b.join().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.id(), b.id());
    assert_eq!(a.stride(0), Some(24));
    assert_eq!(a.stride(1), Some(4));
}

#[test]
fn racing_contexts_compile_once() {
    let device = Arc::new(SoftwareDevice::with_compile_delay(Duration::from_millis(50)));
    let cache = Arc::new(DeviceInputLayoutCache::new(device.clone()));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut context = ContextInputLayoutCache::new(cache);
                let key = VertexLayoutKey::canonicalize(&description());
                let signature = signature();
                barrier.wait();
                let compiled = context.get_or_create(&signature, &key).unwrap();
                //a second lookup is served by the context tier
                let again = context.get_or_create(&signature, &key).unwrap();
                assert!(Arc::ptr_eq(&compiled, &again));
                compiled
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(Arc::ptr_eq(&results[0], &results[1]));
    assert_eq!(device.compiles(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(results[0].attributes().len(), 3);
}

#[test]
fn clear_forces_a_recompile() {
    let device = Arc::new(SoftwareDevice::new());
    let cache = Arc::new(DeviceInputLayoutCache::new(device.clone()));
    let mut context = ContextInputLayoutCache::new(cache.clone());
    let key = VertexLayoutKey::canonicalize(&description());

    let before = context.get_or_create(&signature(), &key).unwrap();
    cache.clear();
    assert!(cache.is_empty());
    let after = context.get_or_create(&signature(), &key).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(device.compiles(), 2);
}
