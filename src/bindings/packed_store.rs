// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The CPU mirror of one constant buffer.

A [`PackedStore`] is a fixed-size, zero-initialized byte region.  Its size is set once, from
reflection, and never changes, so its address is stable for its whole lifetime.  Every access is
bounds-checked.
*/

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStore {
    bytes: Box<[u8]>,
}

impl PackedStore {
    /// A zeroed store of `len` bytes.
    pub fn new(len: usize) -> Self {
        PackedStore {
            bytes: vec![0; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The whole store, as uploaded to the GPU.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), Error> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                size: self.bytes.len(),
            }),
        }
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8], Error> {
        self.check(offset, len)?;
        Ok(&self.bytes[offset..offset + len])
    }

    /// Copies `data` to `offset`.  Nothing is written if any byte would fall outside the store.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        self.check(offset, data.len())?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Replaces the whole contents with `other`'s.  The sizes must match.
    pub fn copy_from(&mut self, other: &PackedStore) -> Result<(), Error> {
        if other.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        self.bytes.copy_from_slice(&other.bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let store = PackedStore::new(32);
        assert_eq!(store.len(), 32);
        assert!(store.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_bounds_writes_nothing() {
        let mut store = PackedStore::new(8);
        store.write(4, &[1, 2, 3, 4]).unwrap();
        assert!(matches!(
            store.write(6, &[9, 9, 9]),
            Err(Error::OutOfBounds { offset: 6, len: 3, size: 8 })
        ));
        assert_eq!(store.as_bytes(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(store.read(usize::MAX, 2).is_err());
        assert_eq!(store.read(4, 2).unwrap(), &[1, 2]);
    }

    #[test]
    fn copy_requires_equal_size() {
        let mut a = PackedStore::new(4);
        let mut b = PackedStore::new(4);
        b.write(0, &[7; 4]).unwrap();
        a.copy_from(&b).unwrap();
        assert_eq!(a, b);
        assert!(a.copy_from(&PackedStore::new(5)).is_err());
    }
}
