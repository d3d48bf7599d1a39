//! # Chunked Byte Copy
//!
//! Copies between two distinct arenas. On x86_64 the bulk moves in 64-byte
//! groups of SSE2 unaligned loads/stores; the remainder (and every other
//! target) goes through `copy_from_slice`. The result is byte-for-byte what
//! a plain loop would produce.

#![allow(unsafe_code)]

/// Below this length the chunked path is not worth it.
#[cfg(target_arch = "x86_64")]
const CHUNKED_THRESHOLD: usize = 256;

/// Copies `src` into the front of `dst`.
///
/// # Panics
///
/// Panics if `dst` is shorter than `src`. Arena callers check capacity first.
pub(crate) fn copy_bytes(dst: &mut [u8], src: &[u8]) {
    let len = src.len();
    let dst = &mut dst[..len];

    #[cfg(target_arch = "x86_64")]
    {
        if len >= CHUNKED_THRESHOLD {
            // SAFETY: both slices are valid for `len` bytes and cannot overlap,
            // one being borrowed mutably.
            unsafe { sse2_copy_unaligned(dst.as_mut_ptr(), src.as_ptr(), len) };
            return;
        }
    }

    dst.copy_from_slice(src);
}

/// SSE2 copy, four 16-byte lanes per iteration.
///
/// SSE2 is part of the x86_64 baseline, so no runtime detection is needed.
///
/// # Safety
///
/// - `src` and `dst` must be valid for `len` bytes
/// - regions must not overlap
#[cfg(target_arch = "x86_64")]
#[inline]
unsafe fn sse2_copy_unaligned(dst: *mut u8, src: *const u8, len: usize) {
    use std::arch::x86_64::{__m128i, _mm_loadu_si128, _mm_storeu_si128};

    let mut offset = 0;

    while offset + 64 <= len {
        let c0 = _mm_loadu_si128(src.add(offset).cast::<__m128i>());
        let c1 = _mm_loadu_si128(src.add(offset + 16).cast::<__m128i>());
        let c2 = _mm_loadu_si128(src.add(offset + 32).cast::<__m128i>());
        let c3 = _mm_loadu_si128(src.add(offset + 48).cast::<__m128i>());

        _mm_storeu_si128(dst.add(offset).cast::<__m128i>(), c0);
        _mm_storeu_si128(dst.add(offset + 16).cast::<__m128i>(), c1);
        _mm_storeu_si128(dst.add(offset + 32).cast::<__m128i>(), c2);
        _mm_storeu_si128(dst.add(offset + 48).cast::<__m128i>(), c3);

        offset += 64;
    }

    if offset < len {
        std::ptr::copy_nonoverlapping(src.add(offset), dst.add(offset), len - offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_bytewise_copy() {
        for len in [0, 1, 15, 63, 64, 255, 256, 257, 1000, 4096 + 7] {
            let src: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let mut dst = vec![0xAAu8; len + 5];
            copy_bytes(&mut dst, &src);
            assert_eq!(&dst[..len], &src[..]);
            assert!(dst[len..].iter().all(|&b| b == 0xAA), "len {len} overran");
        }
    }
}
