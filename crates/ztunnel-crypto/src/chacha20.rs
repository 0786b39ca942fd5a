// ============================================
// File: crates/ztunnel-crypto/src/chacha20.rs
// ============================================
//! # ChaCha20 Stream Cipher
//!
//! ## Creation Reason
//! RFC 8439 ChaCha20, the confidentiality half of the tunnel's AEAD.
//!
//! ## Main Functionality
//! - [`xor_stream`]: In-place encryption/decryption (self-inverse)
//! - [`keystream_block`]: One 64-byte keystream block (for the
//!   Poly1305 one-time key derivation)
//!
//! ## State Layout
//! ```text
//! word  0..3   constants "expand 32-byte k"
//! word  4..11  key, little-endian 4-byte groups
//! word  12     block counter
//! word  13..15 nonce, little-endian 4-byte groups
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Counter 0 is reserved for deriving the Poly1305 key; AEAD
//!   payload encryption starts at counter 1
//! - A (key, nonce) pair must never encrypt two different messages
//!
//! ## Last Modified
//! v0.1.0 - Initial ChaCha20 implementation

use zeroize::Zeroize;

// ============================================
// Constants
// ============================================

/// Key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Keystream block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// "expand 32-byte k"
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

// ============================================
// Core
// ============================================

#[inline]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[a] = x[a].wrapping_add(x[b]);
    x[d] ^= x[a];
    x[d] = x[d].rotate_left(16);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] ^= x[c];
    x[b] = x[b].rotate_left(12);
    x[a] = x[a].wrapping_add(x[b]);
    x[d] ^= x[a];
    x[d] = x[d].rotate_left(8);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] ^= x[c];
    x[b] = x[b].rotate_left(7);
}

fn init_state(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], counter: u32) -> [u32; 16] {
    let mut state = [0u32; 16];
    state[..4].copy_from_slice(&SIGMA);
    for i in 0..8 {
        state[4 + i] = u32::from_le_bytes([
            key[i * 4],
            key[i * 4 + 1],
            key[i * 4 + 2],
            key[i * 4 + 3],
        ]);
    }
    state[12] = counter;
    for i in 0..3 {
        state[13 + i] = u32::from_le_bytes([
            nonce[i * 4],
            nonce[i * 4 + 1],
            nonce[i * 4 + 2],
            nonce[i * 4 + 3],
        ]);
    }
    state
}

/// 20 rounds (10 column/diagonal double-rounds), then the feed-forward
/// addition of the input state.
fn block(input: &[u32; 16]) -> [u32; 16] {
    let mut x = *input;
    for _ in 0..10 {
        // Column rounds
        quarter_round(&mut x, 0, 4, 8, 12);
        quarter_round(&mut x, 1, 5, 9, 13);
        quarter_round(&mut x, 2, 6, 10, 14);
        quarter_round(&mut x, 3, 7, 11, 15);
        // Diagonal rounds
        quarter_round(&mut x, 0, 5, 10, 15);
        quarter_round(&mut x, 1, 6, 11, 12);
        quarter_round(&mut x, 2, 7, 8, 13);
        quarter_round(&mut x, 3, 4, 9, 14);
    }
    for (word, original) in x.iter_mut().zip(input.iter()) {
        *word = word.wrapping_add(*original);
    }
    x
}

// ============================================
// Public API
// ============================================

/// XORs the ChaCha20 keystream into `data` in place.
///
/// Encryption and decryption are the same operation. The block
/// counter starts at `counter` and increments per 64-byte block.
pub fn xor_stream(data: &mut [u8], key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], counter: u32) {
    let mut state = init_state(key, nonce, counter);
    let mut ks = [0u8; BLOCK_SIZE];

    for chunk in data.chunks_mut(BLOCK_SIZE) {
        let mut out = block(&state);
        for (i, word) in out.iter().enumerate() {
            ks[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        for (b, k) in chunk.iter_mut().zip(ks.iter()) {
            *b ^= k;
        }
        state[12] = state[12].wrapping_add(1);
        out.zeroize();
    }

    state.zeroize();
    ks.zeroize();
}

/// Produces one raw keystream block at the given counter.
///
/// Used by the AEAD layer to derive the one-time Poly1305 key from
/// counter 0.
#[must_use]
pub fn keystream_block(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    counter: u32,
) -> [u8; BLOCK_SIZE] {
    let mut state = init_state(key, nonce, counter);
    let out = block(&state);
    let mut ks = [0u8; BLOCK_SIZE];
    for (i, word) in out.iter().enumerate() {
        ks[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    state.zeroize();
    ks
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_rfc8439_block_function() {
        // RFC 8439 §2.3.2
        let key = test_key();
        let nonce: [u8; 12] =
            hex::decode("000000090000004a00000000").unwrap().try_into().unwrap();
        let ks = keystream_block(&key, &nonce, 1);
        assert_eq!(
            hex::encode(ks),
            "10f1e7e4d13b5915500fdd1fa32071c4c7d1f4c733c068030422aa9ac3d46c4e\
             d2826446079faa0914c2d705d98b02a2b5129cd1de164eb9cbd083e8a2503c4e"
        );
    }

    #[test]
    fn test_rfc8439_encryption() {
        // RFC 8439 §2.4.2
        let key = test_key();
        let nonce: [u8; 12] =
            hex::decode("000000000000004a00000000").unwrap().try_into().unwrap();
        let plaintext: &[u8] = b"Ladies and Gentlemen of the class of '99: \
If I could offer you only one tip for the future, sunscreen would be it.";

        let mut data = plaintext.to_vec();
        xor_stream(&mut data, &key, &nonce, 1);
        assert_eq!(
            hex::encode(&data),
            "6e2e359a2568f98041ba0728dd0d6981e97e7aec1d4360c20a27afccfd9fae0b\
             f91b65c5524733ab8f593dabcd62b3571639d624e65152ab8f530c359f0861d8\
             07ca0dbf500d6a6156a38e088a22b65e52bc514d16ccf806818ce91ab7793736\
             5af90bbf74a35be6b40b8eedf2785e42874d"
        );

        // Decryption is the same transform
        xor_stream(&mut data, &key, &nonce, 1);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn test_counter_advances_across_blocks() {
        let key = test_key();
        let nonce = [7u8; 12];

        // Encrypting 128 bytes at counter 1 must equal two separate
        // 64-byte encryptions at counters 1 and 2
        let mut big = [0u8; 128];
        xor_stream(&mut big, &key, &nonce, 1);

        let mut lo = [0u8; 64];
        let mut hi = [0u8; 64];
        xor_stream(&mut lo, &key, &nonce, 1);
        xor_stream(&mut hi, &key, &nonce, 2);

        assert_eq!(&big[..64], &lo[..]);
        assert_eq!(&big[64..], &hi[..]);
    }

    #[test]
    fn test_partial_block() {
        let key = test_key();
        let nonce = [1u8; 12];
        let mut data = [0xabu8; 13];
        xor_stream(&mut data, &key, &nonce, 0);
        let mut back = data;
        xor_stream(&mut back, &key, &nonce, 0);
        assert_eq!(back, [0xabu8; 13]);
    }
}
