// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines types for use in constant buffers.
*/

/**
A value that can be copied into a constant buffer byte for byte.

# Safety

Implementors must be plain old data: `#[repr(C)]` or `#[repr(transparent)]`, no padding bytes,
no pointers or references, and every bit pattern must be a valid value, since values are read back
from arbitrary buffer contents.
*/
pub unsafe trait ShaderValue: Copy + 'static {}

unsafe impl ShaderValue for f32 {}
unsafe impl ShaderValue for i32 {}
unsafe impl ShaderValue for u32 {}
unsafe impl ShaderValue for half::f16 {}
unsafe impl ShaderValue for bool {}
unsafe impl<T: ShaderValue, const N: usize> ShaderValue for [T; N] {}

/// A row-major 4x4 matrix, as accepted by the matrix setters.
pub type Matrix4 = [[f32; 4]; 4];

/// The identity [`Matrix4`].
pub const IDENTITY: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// A shader boolean, which occupies 4 bytes in a constant buffer.
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct bool(u32);

impl bool {
    pub const fn new(value: std::primitive::bool) -> Self {
        bool(if value { 1 } else { 0 })
    }
}
impl std::convert::From<bool> for std::primitive::bool {
    fn from(value: bool) -> Self {
        value.0 != 0
    }
}
impl std::convert::From<std::primitive::bool> for bool {
    fn from(value: std::primitive::bool) -> Self {
        bool::new(value)
    }
}

pub(crate) fn bytes_of<T: ShaderValue>(value: &T) -> &[u8] {
    //safe because ShaderValue guarantees no padding
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

pub(crate) fn bytes_of_slice<T: ShaderValue>(values: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, size_of_val(values)) }
}

/// Reads a value out of `bytes`, which must be exactly `size_of::<T>()` long.
pub(crate) fn read_value<T: ShaderValue>(bytes: &[u8]) -> T {
    assert_eq!(bytes.len(), size_of::<T>(), "wrong byte count for value");
    //safe because every bit pattern is valid for a ShaderValue; the store has no alignment guarantee
    unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_bool_is_four_bytes() {
        assert_eq!(size_of::<bool>(), 4);
        let t: bool = true.into();
        assert_eq!(bytes_of(&t), &1u32.to_ne_bytes());
        assert!(std::primitive::bool::from(t));
        assert!(!std::primitive::bool::from(bool::default()));
    }

    #[test]
    fn values_round_trip_through_bytes() {
        let v = [1.5f32, -2.0, 3.25];
        let back: [f32; 3] = read_value(bytes_of(&v));
        assert_eq!(back, v);
        let h = [half::f16::from_f32(0.5); 2];
        assert_eq!(bytes_of(&h).len(), 4);
        assert_eq!(bytes_of_slice(&[IDENTITY; 2]).len(), 128);
    }
}
