#![forbid(unsafe_code)]
//! Encoding, hashing, and cursor utilities used by the row-key codec.

pub mod ord {
    //! Big-endian encoders whose byte order matches numeric order.

    use core::convert::TryInto;

    const U32_LEN: usize = core::mem::size_of::<u32>();

    /// Appends `v` in big-endian byte order.
    pub fn put_u32_be(dst: &mut Vec<u8>, v: u32) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Decodes a big-endian u32 from the first four bytes of `src`.
    pub fn get_u32_be(src: &[u8]) -> Option<u32> {
        let head: [u8; U32_LEN] = src.get(..U32_LEN)?.try_into().ok()?;
        Some(u32::from_be_bytes(head))
    }

    /// Appends `v` in big-endian byte order.
    pub fn put_u16_be(dst: &mut Vec<u8>, v: u16) {
        dst.extend_from_slice(&v.to_be_bytes());
    }
}

pub mod term {
    //! Terminated strings for composite keys.

    /// Terminator separating variable-length key fields.
    pub const NUL: u8 = 0;

    /// Appends `s` followed by the NUL terminator. `s` must not contain NUL.
    pub fn put_terminated(dst: &mut Vec<u8>, s: &str) {
        debug_assert!(
            !s.as_bytes().contains(&NUL),
            "terminated key field must not contain NUL"
        );
        dst.extend_from_slice(s.as_bytes());
        dst.push(NUL);
    }

    /// Appends `s` verbatim; only valid for the last field of a key.
    pub fn put_raw(dst: &mut Vec<u8>, s: &str) {
        dst.extend_from_slice(s.as_bytes());
    }
}

pub mod hash {
    //! Non-cryptographic hashing used to salt row keys.

    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    /// Seed the row-key salt is computed with.
    pub const ROW_SALT_SEED: u32 = 0xffff_ffff;

    /// MurmurHash3, x86 32-bit variant.
    pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
        let mut h = seed;
        let mut blocks = data.chunks_exact(4);
        for block in &mut blocks {
            let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
            h ^= mix_k(k);
            h = h.rotate_left(13);
            h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
        }

        let tail = blocks.remainder();
        let mut k = 0u32;
        if tail.len() >= 3 {
            k ^= (tail[2] as u32) << 16;
        }
        if tail.len() >= 2 {
            k ^= (tail[1] as u32) << 8;
        }
        if !tail.is_empty() {
            k ^= tail[0] as u32;
            h ^= mix_k(k);
        }

        h ^= data.len() as u32;
        fmix32(h)
    }

    /// Salt prefix for a primary id.
    pub fn row_salt(id: &str) -> u32 {
        murmur3_x86_32(id.as_bytes(), ROW_SALT_SEED)
    }

    fn mix_k(k: u32) -> u32 {
        k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
    }

    fn fmix32(mut h: u32) -> u32 {
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        h
    }
}

pub mod buf {
    //! A simple slice-backed cursor for ergonomic parsing.

    use core::fmt;

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes, or `None` if fewer remain.
        pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
            let end = self.off.checked_add(n)?;
            let slice = self.buf.get(self.off..end)?;
            self.off = end;
            Some(slice)
        }

        /// Takes bytes up to (not including) `terminator` and skips it.
        pub fn take_until(&mut self, terminator: u8) -> Option<&'a [u8]> {
            let rest = self.buf.get(self.off..)?;
            let pos = rest.iter().position(|b| *b == terminator)?;
            self.off += pos + 1;
            Some(&rest[..pos])
        }

        /// Takes every remaining byte.
        pub fn rest(&mut self) -> &'a [u8] {
            let slice = self.buf.get(self.off..).unwrap_or(&[]);
            self.off = self.buf.len();
            slice
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{buf::Cursor, hash, ord, term};
    use proptest::prelude::*;

    #[test]
    fn murmur3_reference_vectors() {
        assert_eq!(hash::murmur3_x86_32(b"", 0), 0);
        assert_eq!(hash::murmur3_x86_32(b"", 1), 0x514e_28b7);
        assert_eq!(hash::murmur3_x86_32(b"", 0xffff_ffff), 0x81f1_6f39);
        assert_eq!(hash::murmur3_x86_32(&[0, 0, 0, 0], 0), 0x2362_f9de);
        assert_eq!(hash::murmur3_x86_32(b"aaaa", 0x9747_b28c), 0x5a97_808a);
        assert_eq!(hash::murmur3_x86_32(b"Hello, world!", 0x9747_b28c), 0x2488_4cba);
        assert_eq!(
            hash::murmur3_x86_32(b"The quick brown fox jumps over the lazy dog", 0x9747_b28c),
            0x2fa8_26cd
        );
    }

    #[test]
    fn u32_roundtrip_and_truncation() {
        let mut dst = Vec::new();
        ord::put_u32_be(&mut dst, 0xdead_beef);
        assert_eq!(dst, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(ord::get_u32_be(&dst), Some(0xdead_beef));
        assert_eq!(ord::get_u32_be(&dst[..3]), None);
    }

    #[test]
    fn cursor_splits_terminated_fields() {
        let mut buf = Vec::new();
        term::put_terminated(&mut buf, "out");
        term::put_terminated(&mut buf, "");
        term::put_raw(&mut buf, "in\0side");
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.take_until(term::NUL), Some(&b"out"[..]));
        assert_eq!(cursor.take_until(term::NUL), Some(&b""[..]));
        assert_eq!(cursor.rest(), b"in\0side");
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.take(1), None);
    }

    proptest! {
        #[test]
        fn u32_order_preserving(a in any::<u32>(), b in any::<u32>()) {
            let mut ea = Vec::new();
            let mut eb = Vec::new();
            ord::put_u32_be(&mut ea, a);
            ord::put_u32_be(&mut eb, b);
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }
    }
}
