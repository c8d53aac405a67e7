//! Fixed-width byte keys hashed with Bob Jenkins' lookup3.
//!
//! Every key shape used by the decoder and the flow table (node keys, flow
//! 5-tuples, ...) is a [`FixedKey`] of some length `N`.
use std::fmt;
use std::hash::{Hash, Hasher};

/// Seed used for every key hash.
pub const KEY_SEED: u32 = 0;

/// Immutable byte array compared byte-wise and hashed with [`hashlittle`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FixedKey<const N: usize>([u8; N]);

impl<const N: usize> FixedKey<N> {
    pub const LEN: usize = N;

    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// 32-bit lookup3 hash of the raw bytes, seeded with [`KEY_SEED`].
    pub fn hash32(&self) -> u32 {
        hashlittle(&self.0, KEY_SEED)
    }
}

impl<const N: usize> Hash for FixedKey<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash32());
    }
}

impl<const N: usize> fmt::Debug for FixedKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FixedKey<{}>({})", N, hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Display for FixedKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[inline]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

#[inline]
fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

#[inline]
fn word(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// lookup3 `hashlittle` over arbitrary bytes.
///
/// Reads the input as little-endian words regardless of host byte order, so
/// the result matches the reference implementation on little-endian machines
/// everywhere.
pub fn hashlittle(key: &[u8], initval: u32) -> u32 {
    let init = 0xdead_beef_u32
        .wrapping_add(key.len() as u32)
        .wrapping_add(initval);
    let (mut a, mut b, mut c) = (init, init, init);

    let mut rest = key;
    while rest.len() > 12 {
        a = a.wrapping_add(word(rest, 0));
        b = b.wrapping_add(word(rest, 4));
        c = c.wrapping_add(word(rest, 8));
        mix(&mut a, &mut b, &mut c);
        rest = &rest[12..];
    }

    if rest.is_empty() {
        return c;
    }

    // Zero padding reproduces the fall-through tail of the reference.
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(word(&tail, 0));
    b = b.wrapping_add(word(&tail, 4));
    c = c.wrapping_add(word(&tail, 8));
    final_mix(&mut a, &mut b, &mut c);
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_hashlittle_reference_vectors() {
        assert_eq!(hashlittle(b"", 0), 0xdeadbeef);
        assert_eq!(hashlittle(b"", 0xdeadbeef), 0xbd5b7dde);
        assert_eq!(hashlittle(b"Four score and seven years ago", 0), 0x17770551);
        assert_eq!(hashlittle(b"Four score and seven years ago", 1), 0xcd628161);
    }

    #[test]
    fn test_tail_lengths_differ() {
        // Every tail length from 1 to 12 takes the padded path.
        let data = [0x5au8; 25];
        let hashes: HashSet<u32> = (0..=25).map(|n| hashlittle(&data[..n], 0)).collect();
        assert_eq!(hashes.len(), 26);
    }

    #[test]
    fn test_keys_work_in_maps() {
        let mut map: HashMap<FixedKey<2>, u32> = HashMap::new();
        *map.entry(FixedKey::new([0, 80])).or_insert(0) += 1;
        *map.entry(FixedKey::new([0, 80])).or_insert(0) += 1;
        *map.entry(FixedKey::new([1, 187])).or_insert(0) += 1;
        assert_eq!(map.len(), 2);
        assert_eq!(map[&FixedKey::new([0, 80])], 2);
    }

    #[test]
    fn test_hash_is_seeded_with_zero() {
        let key = FixedKey::new(*b"Four score and seven years ago");
        assert_eq!(key.hash32(), 0x17770551);
        assert_eq!(FixedKey::<30>::LEN, 30);
    }

    #[test]
    fn test_display_is_hex() {
        let key = FixedKey::new([0xde, 0xad]);
        assert_eq!(key.to_string(), "dead");
        assert_eq!(format!("{:?}", key), "FixedKey<2>(dead)");
    }
}
