//! A per-object constant buffer driven through its whole lifecycle.

use std::sync::Arc;

use effect_binding::bindings::buffer_types::IDENTITY;
use effect_binding::bindings::constant_buffer::ConstantBuffer;
use effect_binding::bindings::reflection::{
    ConstantBufferDescription, MatrixOrder, ParameterDescription, ScalarType,
};
use effect_binding::{Error, SoftwareDevice};

fn per_object() -> ConstantBufferDescription {
    ConstantBufferDescription::new("PerObject", 80)
        .with_parameter(ParameterDescription::matrix("World", 0, 4, 4, MatrixOrder::RowMajor))
        .with_parameter(ParameterDescription::vector("Color", 64, ScalarType::Float, 4))
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    f32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn world_and_color() {
    let device = Arc::new(SoftwareDevice::new());
    let mut buffer = ConstantBuffer::new(&device, per_object()).unwrap();
    assert_eq!(buffer.size(), 80);
    assert_eq!(device.buffers_created(), 1);
    assert!(buffer.is_dirty());

    buffer.set("World", &IDENTITY).unwrap();
    buffer.set("Color", &[1.0f32, 0.0, 0.0, 1.0]).unwrap();
    assert_eq!(buffer.get::<[f32; 4]>("Color").unwrap(), [1.0, 0.0, 0.0, 1.0]);

    assert!(buffer.update().unwrap());
    assert!(!buffer.is_dirty());
    assert_eq!(device.uploads(), 1);

    let uploaded = buffer.gpu_buffer().contents();
    assert_eq!(uploaded.len(), 80);
    assert_eq!(uploaded, buffer.as_bytes());
    for row in 0..4 {
        for column in 0..4 {
            let expected = if row == column { 1.0 } else { 0.0 };
            assert_eq!(f32_at(&uploaded, row * 16 + column * 4), expected);
        }
    }
    assert_eq!(f32_at(&uploaded, 64), 1.0);
    assert_eq!(f32_at(&uploaded, 68), 0.0);
    assert_eq!(f32_at(&uploaded, 76), 1.0);
}

fn identity_bytes() -> Vec<u8> {
    IDENTITY
        .iter()
        .flatten()
        .flat_map(|value| value.to_ne_bytes())
        .collect()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn world_then_raw_color() {
    let device = Arc::new(SoftwareDevice::new());
    let mut buffer = ConstantBuffer::new(&device, per_object()).unwrap();

    buffer.set("World", &IDENTITY).unwrap();
    assert!(buffer.update().unwrap());
    assert!(!buffer.is_dirty());
    let mut expected = identity_bytes();
    expected.extend_from_slice(&[0; 16]);
    assert_eq!(buffer.gpu_buffer().contents(), expected);

    buffer.set_bytes("Color", &[0xFF; 16]).unwrap();
    assert!(buffer.is_dirty());
    assert!(buffer.update().unwrap());
    assert!(!buffer.is_dirty());
    let mut expected = identity_bytes();
    expected.extend_from_slice(&[0xFF; 16]);
    assert_eq!(buffer.gpu_buffer().contents(), expected);
    assert_eq!(device.uploads(), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn dirty_lifecycle() {
    let device = Arc::new(SoftwareDevice::new());
    let mut buffer = ConstantBuffer::new(&device, per_object()).unwrap();
    assert!(buffer.is_dirty());
    buffer.update().unwrap();
    assert!(!buffer.is_dirty());

    buffer.set(1usize, &[0.0f32, 1.0, 0.0, 1.0]).unwrap();
    assert!(buffer.is_dirty());
    //the mirror reflects the write before any upload
    assert_eq!(buffer.get::<[f32; 4]>("Color").unwrap(), [0.0, 1.0, 0.0, 1.0]);
    assert_ne!(buffer.gpu_buffer().contents(), buffer.as_bytes());

    assert!(buffer.update().unwrap());
    assert!(!buffer.update().unwrap());
    assert_eq!(device.uploads(), 2);
    assert_eq!(buffer.gpu_buffer().contents(), buffer.as_bytes());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn wrong_sizes_and_names() {
    let device = Arc::new(SoftwareDevice::new());
    let mut buffer = ConstantBuffer::new(&device, per_object()).unwrap();
    buffer.update().unwrap();

    assert!(matches!(
        buffer.set("Color", &[1.0f32; 3]),
        Err(Error::SizeMismatch { expected: 16, actual: 12 })
    ));
    assert!(matches!(
        buffer.set_bytes("World", &[0u8; 63]),
        Err(Error::SizeMismatch { expected: 64, actual: 63 })
    ));
    assert!(matches!(buffer.set("Colour", &[0.0f32; 4]), Err(Error::UnknownParameter(_))));
    assert!(matches!(buffer.get::<f32>(5usize), Err(Error::UnknownParameter(_))));
    assert!(!buffer.is_dirty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn copy_between_buffers() {
    let device = Arc::new(SoftwareDevice::new());
    let mut source = ConstantBuffer::new(&device, per_object()).unwrap();
    let mut destination = ConstantBuffer::new(&device, per_object()).unwrap();
    source.set("Color", &[0.25f32; 4]).unwrap();
    destination.update().unwrap();

    source.copy_to(&mut destination).unwrap();
    assert!(destination.is_dirty());
    assert_eq!(destination.as_bytes(), source.as_bytes());
    assert_eq!(source, destination);

    let mut small = ConstantBuffer::new(
        &device,
        ConstantBufferDescription::new("Small", 16)
            .with_parameter(ParameterDescription::vector("Color", 0, ScalarType::Float, 4)),
    )
    .unwrap();
    small.set("Color", &[9.0f32; 4]).unwrap();
    small.update().unwrap();
    let before = small.as_bytes().to_vec();
    assert!(matches!(
        source.copy_to(&mut small),
        Err(Error::SizeMismatch { expected: 16, actual: 80 })
    ));
    assert_eq!(small.as_bytes(), before.as_slice());
    assert!(!small.is_dirty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn lost_device() {
    let device = Arc::new(SoftwareDevice::new());
    device.set_lost(true);
    assert!(matches!(
        ConstantBuffer::new(&device, per_object()),
        Err(Error::DeviceResourceCreationFailure(_))
    ));
    device.set_lost(false);
    let mut buffer = ConstantBuffer::new(&device, per_object()).unwrap();
    device.set_lost(true);
    assert!(buffer.update().is_err());
    assert!(buffer.is_dirty());
}
