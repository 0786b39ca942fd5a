// ============================================
// File: crates/ztunnel-crypto/src/poly1305.rs
// ============================================
//! # Poly1305 One-Time Authenticator
//!
//! ## Creation Reason
//! RFC 8439 Poly1305, the integrity half of the tunnel's AEAD. The
//! key half `r` is clamped and multiplied into the accumulator block
//! by block; the second key half is added at the end.
//!
//! ## Main Functionality
//! - [`auth`]: One-shot tag over a message with a 32-byte one-time key
//!
//! ## Representation
//! 130-bit accumulator in 5 limbs of 26 bits each. Products reduce
//! through 2^130 == 5 (mod 2^130 - 5), which turns the wrapped limb
//! contributions into a multiply-by-5.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The key is ONE-TIME: authenticating two messages under the same
//!   key forfeits unforgeability
//! - The final h vs h - p selection is mask-based; keep it free of
//!   branches
//!
//! ## Last Modified
//! v0.1.0 - Initial Poly1305 implementation

use zeroize::Zeroize;

// ============================================
// Constants
// ============================================

/// Authenticator key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Tag size in bytes.
pub const TAG_SIZE: usize = 16;

const LIMB_MASK: u32 = 0x03ff_ffff;

// ============================================
// State
// ============================================

#[derive(Zeroize)]
struct Poly1305 {
    /// Clamped key half, 26-bit limbs
    r: [u32; 5],
    /// Accumulator, 26-bit limbs
    h: [u32; 5],
    /// Second key half, added after reduction
    pad: [u32; 4],
}

fn load32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

impl Poly1305 {
    /// Splits the key into clamped `r` and `pad`.
    ///
    /// The masks fold the RFC 8439 §2.5 clamp (top nibbles of bytes
    /// 3/7/11/15, low 2 bits of bytes 4/8/12) into the 26-bit limb
    /// windows.
    fn new(key: &[u8; KEY_SIZE]) -> Self {
        let r = [
            load32(&key[0..4]) & 0x03ff_ffff,
            (load32(&key[3..7]) >> 2) & 0x03ff_ff03,
            (load32(&key[6..10]) >> 4) & 0x03ff_c0ff,
            (load32(&key[9..13]) >> 6) & 0x03f0_3fff,
            (load32(&key[12..16]) >> 8) & 0x000f_ffff,
        ];
        let pad = [
            load32(&key[16..20]),
            load32(&key[20..24]),
            load32(&key[24..28]),
            load32(&key[28..32]),
        ];
        Self { r, h: [0; 5], pad }
    }

    /// Absorbs 16-byte blocks: `h = (h + block) * r mod 2^130 - 5`.
    ///
    /// `hibit` is 1 << 24 for full blocks (the implicit bit 128 of
    /// the 130-bit value) and 0 for the explicitly padded final block.
    fn blocks(&mut self, data: &[u8], hibit: u32) {
        let [r0, r1, r2, r3, r4] = self.r.map(u64::from);
        let (s1, s2, s3, s4) = (r1 * 5, r2 * 5, r3 * 5, r4 * 5);

        for chunk in data.chunks_exact(16) {
            let t0 = load32(&chunk[0..4]);
            let t1 = load32(&chunk[4..8]);
            let t2 = load32(&chunk[8..12]);
            let t3 = load32(&chunk[12..16]);

            // h += block (radix 2^26)
            self.h[0] += t0 & LIMB_MASK;
            self.h[1] += ((t0 >> 26) | (t1 << 6)) & LIMB_MASK;
            self.h[2] += ((t1 >> 20) | (t2 << 12)) & LIMB_MASK;
            self.h[3] += ((t2 >> 14) | (t3 << 18)) & LIMB_MASK;
            self.h[4] += (t3 >> 8) | hibit;

            let [h0, h1, h2, h3, h4] = self.h.map(u64::from);

            // h *= r, folding wrapped limbs via *5
            let d0 = h0 * r0 + h1 * s4 + h2 * s3 + h3 * s2 + h4 * s1;
            let d1 = h0 * r1 + h1 * r0 + h2 * s4 + h3 * s3 + h4 * s2;
            let d2 = h0 * r2 + h1 * r1 + h2 * r0 + h3 * s4 + h4 * s3;
            let d3 = h0 * r3 + h1 * r2 + h2 * r1 + h3 * r0 + h4 * s4;
            let d4 = h0 * r4 + h1 * r3 + h2 * r2 + h3 * r1 + h4 * r0;

            // Partial carry; limbs settle below 2^26 plus a stray bit
            let mut c;
            c = d0 >> 26;
            self.h[0] = (d0 as u32) & LIMB_MASK;
            let d1 = d1 + c;
            c = d1 >> 26;
            self.h[1] = (d1 as u32) & LIMB_MASK;
            let d2 = d2 + c;
            c = d2 >> 26;
            self.h[2] = (d2 as u32) & LIMB_MASK;
            let d3 = d3 + c;
            c = d3 >> 26;
            self.h[3] = (d3 as u32) & LIMB_MASK;
            let d4 = d4 + c;
            c = d4 >> 26;
            self.h[4] = (d4 as u32) & LIMB_MASK;
            self.h[0] += (c as u32) * 5;
            let c2 = self.h[0] >> 26;
            self.h[0] &= LIMB_MASK;
            self.h[1] += c2;
        }
    }

    /// Final reduction, constant-time h vs h - p selection, pad add.
    fn finalize(&mut self) -> [u8; TAG_SIZE] {
        // Fully propagate carries
        let mut c = self.h[1] >> 26;
        self.h[1] &= LIMB_MASK;
        self.h[2] += c;
        c = self.h[2] >> 26;
        self.h[2] &= LIMB_MASK;
        self.h[3] += c;
        c = self.h[3] >> 26;
        self.h[3] &= LIMB_MASK;
        self.h[4] += c;
        c = self.h[4] >> 26;
        self.h[4] &= LIMB_MASK;
        self.h[0] += c * 5;
        c = self.h[0] >> 26;
        self.h[0] &= LIMB_MASK;
        self.h[1] += c;

        // g = h + 5 - 2^130; the borrow bit of g4 says whether h < p
        let mut g0 = self.h[0].wrapping_add(5);
        c = g0 >> 26;
        g0 &= LIMB_MASK;
        let mut g1 = self.h[1].wrapping_add(c);
        c = g1 >> 26;
        g1 &= LIMB_MASK;
        let mut g2 = self.h[2].wrapping_add(c);
        c = g2 >> 26;
        g2 &= LIMB_MASK;
        let mut g3 = self.h[3].wrapping_add(c);
        c = g3 >> 26;
        g3 &= LIMB_MASK;
        let g4 = self.h[4].wrapping_add(c).wrapping_sub(1 << 26);

        // Select h if h < p, else h - p, without branching
        let mask = (g4 >> 31).wrapping_sub(1);
        let not_mask = !mask;
        self.h[0] = (self.h[0] & not_mask) | (g0 & mask);
        self.h[1] = (self.h[1] & not_mask) | (g1 & mask);
        self.h[2] = (self.h[2] & not_mask) | (g2 & mask);
        self.h[3] = (self.h[3] & not_mask) | (g3 & mask);
        self.h[4] = (self.h[4] & not_mask) | (g4 & mask);

        // h = (h + pad) mod 2^128, serialized little-endian
        let mut f: u64 =
            (u64::from(self.h[0]) | (u64::from(self.h[1]) << 26)) + u64::from(self.pad[0]);
        let mut tag = [0u8; TAG_SIZE];
        tag[0..4].copy_from_slice(&(f as u32).to_le_bytes());

        f = ((u64::from(self.h[1]) >> 6) | (u64::from(self.h[2]) << 20))
            + u64::from(self.pad[1])
            + (f >> 32);
        tag[4..8].copy_from_slice(&(f as u32).to_le_bytes());

        f = ((u64::from(self.h[2]) >> 12) | (u64::from(self.h[3]) << 14))
            + u64::from(self.pad[2])
            + (f >> 32);
        tag[8..12].copy_from_slice(&(f as u32).to_le_bytes());

        f = ((u64::from(self.h[3]) >> 18) | (u64::from(self.h[4]) << 8))
            + u64::from(self.pad[3])
            + (f >> 32);
        tag[12..16].copy_from_slice(&(f as u32).to_le_bytes());

        tag
    }
}

// ============================================
// Public API
// ============================================

/// Authenticates `msg` under a one-time `key`, producing a 16-byte tag.
#[must_use]
pub fn auth(msg: &[u8], key: &[u8; KEY_SIZE]) -> [u8; TAG_SIZE] {
    let mut st = Poly1305::new(key);

    let full = msg.len() & !15;
    st.blocks(&msg[..full], 1 << 24);

    let remaining = msg.len() - full;
    if remaining > 0 {
        let mut block = [0u8; 16];
        block[..remaining].copy_from_slice(&msg[full..]);
        block[remaining] = 1;
        st.blocks(&block, 0);
        block.zeroize();
    }

    let tag = st.finalize();
    st.zeroize();
    tag
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc8439_vector() {
        // RFC 8439 §2.5.2
        let key: [u8; 32] = hex::decode(
            "85d6be7857556d337f4452fe42d506a80103808afb0db2fd4abff6af4149f51b",
        )
        .unwrap()
        .try_into()
        .unwrap();
        let tag = auth(b"Cryptographic Forum Research Group", &key);
        assert_eq!(hex::encode(tag), "a8061dc1305136c6c22b8baf0c0127a9");
    }

    #[test]
    fn test_empty_message() {
        // h stays zero, so the tag is exactly the pad half of the key
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let tag = auth(b"", &key);
        assert_eq!(tag[..], key[16..32]);
    }

    #[test]
    fn test_block_boundary_lengths() {
        let key = [0x7fu8; 32];
        // Distinct messages around the 16-byte boundary must all
        // produce distinct tags
        let mut tags = Vec::new();
        for len in [15usize, 16, 17, 31, 32, 33] {
            let msg = vec![0x61u8; len];
            tags.push(auth(&msg, &key));
        }
        for i in 0..tags.len() {
            for j in (i + 1)..tags.len() {
                assert_ne!(tags[i], tags[j]);
            }
        }
    }

    #[test]
    fn test_key_sensitivity() {
        let msg = b"the quick brown fox";
        let mut key = [0x11u8; 32];
        let tag1 = auth(msg, &key);
        key[0] ^= 1;
        let tag2 = auth(msg, &key);
        assert_ne!(tag1, tag2);
    }
}
