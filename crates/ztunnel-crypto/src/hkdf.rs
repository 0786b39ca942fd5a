// ============================================
// File: crates/ztunnel-crypto/src/hkdf.rs
// ============================================
//! # HMAC-SHA256 and HKDF-SHA256
//!
//! ## Creation Reason
//! Key derivation for the tunnel: HMAC per RFC 2104 and the
//! extract-and-expand KDF per RFC 5869, over [`crate::sha256`].
//!
//! ## Main Functionality
//! - [`HmacSha256`]: Streaming MAC
//! - [`hmac_sha256`]: One-shot MAC
//! - [`hkdf_sha256`]: Extract + expand into a caller-sized buffer
//!
//! ## Main Logical Flow
//! 1. Extract: `PRK = HMAC(salt, IKM)`; a missing salt is 32 zero bytes
//! 2. Expand: `T(n) = HMAC(PRK, T(n-1) || info || n)` for n = 1, 2, ...
//! 3. Concatenated T blocks fill the output buffer
//!
//! ## ⚠️ Important Note for Next Developer
//! - Output is capped at 255 * 32 = 8160 bytes by RFC 5869; requests
//!   beyond that are an error, not a truncation
//! - PRK and T(n) are key material and are zeroed before returning
//!
//! ## Last Modified
//! v0.1.0 - Initial HMAC/HKDF implementation

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::sha256::{self, Sha256, BLOCK_SIZE, DIGEST_SIZE};

// ============================================
// Constants
// ============================================

/// Maximum HKDF-SHA256 output length in bytes (255 blocks).
pub const MAX_OUTPUT_SIZE: usize = 255 * DIGEST_SIZE;

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

// ============================================
// HmacSha256
// ============================================

/// Streaming HMAC-SHA256.
///
/// Keys longer than the 64-byte block are hashed down first; shorter
/// keys are right-padded with zeroes, per RFC 2104.
///
/// # Example
/// ```
/// use ztunnel_crypto::hkdf::HmacSha256;
///
/// let mut mac = HmacSha256::new(b"key");
/// mac.update(b"message");
/// let tag = mac.finalize();
/// assert_eq!(tag.len(), 32);
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HmacSha256 {
    /// Inner hash, primed with key XOR ipad
    inner: Sha256,
    /// Key XOR opad, kept for the outer hash
    opad: [u8; BLOCK_SIZE],
}

impl HmacSha256 {
    /// Creates a MAC instance keyed with `key`.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        let mut key_block = [0u8; BLOCK_SIZE];
        if key.len() > BLOCK_SIZE {
            key_block[..DIGEST_SIZE].copy_from_slice(&sha256::digest(key));
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut ipad = [0u8; BLOCK_SIZE];
        let mut opad = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            ipad[i] = key_block[i] ^ IPAD;
            opad[i] = key_block[i] ^ OPAD;
        }

        let mut inner = Sha256::new();
        inner.update(&ipad);

        key_block.zeroize();
        ipad.zeroize();

        Self { inner, opad }
    }

    /// Absorbs message data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Completes the MAC and returns the 32-byte tag.
    #[must_use]
    pub fn finalize(mut self) -> [u8; DIGEST_SIZE] {
        let inner_hash = std::mem::take(&mut self.inner).finalize();

        let mut outer = Sha256::new();
        outer.update(&self.opad);
        outer.update(&inner_hash);
        outer.finalize()
    }
}

/// Computes HMAC-SHA256 over `data` in one call.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut mac = HmacSha256::new(key);
    mac.update(data);
    mac.finalize()
}

// ============================================
// HKDF
// ============================================

/// Derives `out.len()` bytes of key material per RFC 5869.
///
/// # Arguments
/// * `out` - Output buffer; its length selects the derived size
/// * `ikm` - Input keying material (e.g. an X25519 shared secret)
/// * `salt` - Optional extraction salt; `None` and `Some(&[])` both
///   fall back to 32 zero bytes
/// * `info` - Context string for domain separation
///
/// # Errors
/// - `OutputTooLong` if `out.len()` exceeds 255 * 32 bytes
pub fn hkdf_sha256(out: &mut [u8], ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<()> {
    if out.len() > MAX_OUTPUT_SIZE {
        return Err(CryptoError::output_too_long(out.len(), MAX_OUTPUT_SIZE));
    }

    // Extract
    const ZERO_SALT: [u8; DIGEST_SIZE] = [0; DIGEST_SIZE];
    let salt = match salt {
        Some(s) if !s.is_empty() => s,
        _ => &ZERO_SALT[..],
    };
    let mut prk = hmac_sha256(salt, ikm);

    // Expand
    let mut t = [0u8; DIGEST_SIZE];
    let mut t_len = 0usize;
    let mut counter = 1u8;
    let mut offset = 0usize;

    while offset < out.len() {
        let mut mac = HmacSha256::new(&prk);
        mac.update(&t[..t_len]);
        mac.update(info);
        mac.update(&[counter]);
        t = mac.finalize();
        t_len = DIGEST_SIZE;

        let copy_len = (out.len() - offset).min(DIGEST_SIZE);
        out[offset..offset + copy_len].copy_from_slice(&t[..copy_len]);
        offset += copy_len;
        counter = counter.wrapping_add(1);
    }

    prk.zeroize();
    t.zeroize();
    Ok(())
}

// ============================================
// Tests
// ============================================
