// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Structural hashing.

Layout identities are compared by content, so their digests must be stable for the lifetime of
the process.  We use a fixed-seed foldhash rather than a per-map random state.
*/

use std::hash::{BuildHasher, Hash};

const STRUCTURAL_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Hashes `value` by content with a process-stable seed.
pub(crate) fn structural_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    foldhash::fast::FixedState::with_seed(STRUCTURAL_SEED).hash_one(value)
}

#[cfg(test)]
mod tests {
    use super::structural_hash;

    #[test]
    fn equal_content_equal_hash() {
        let a = vec![1u32, 2, 3];
        let b = vec![1u32, 2, 3];
        assert_eq!(structural_hash(&a), structural_hash(&b));
        assert_ne!(structural_hash(&a), structural_hash(&vec![3u32, 2, 1]));
    }
}
