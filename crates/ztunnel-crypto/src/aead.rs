// ============================================
// File: crates/ztunnel-crypto/src/aead.rs
// ============================================
//! # ChaCha20-Poly1305 AEAD
//!
//! ## Creation Reason
//! Composes the stream cipher and the one-time MAC into the RFC 8439
//! AEAD construction that protects every tunnel payload.
//!
//! ## Main Functionality
//! - [`encrypt`]: Seal plaintext, producing ciphertext + 16-byte tag
//! - [`decrypt`]: Verify tag in constant time, then open ciphertext
//!
//! ## Construction
//! ```text
//! otk        = ChaCha20(key, nonce, counter=0)[0..32]
//! ciphertext = ChaCha20(key, nonce, counter=1) XOR plaintext
//! mac_data   = aad || pad16(aad)
//!           || ciphertext || pad16(ciphertext)
//!           || len(aad) as u64-LE || len(ciphertext) as u64-LE
//! tag        = Poly1305(mac_data, otk)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Decrypt verifies BEFORE it decrypts; never reorder this
//! - The tag comparison must stay on `constant_time_eq`; a
//!   short-circuiting compare leaks the tag prefix length
//! - On `Authentication` errors the output buffer is untouched but
//!   callers must still treat it as undefined
//!
//! ## Last Modified
//! v0.1.0 - Initial AEAD composition

use zeroize::Zeroize;

use crate::chacha20;
use crate::error::{CryptoError, Result};
use crate::mem::constant_time_eq;
use crate::poly1305;

// ============================================
// Constants
// ============================================

/// AEAD key size in bytes.
pub const KEY_SIZE: usize = chacha20::KEY_SIZE;

/// AEAD nonce size in bytes.
pub const NONCE_SIZE: usize = chacha20::NONCE_SIZE;

/// Authentication tag size in bytes.
pub const TAG_SIZE: usize = poly1305::TAG_SIZE;

// ============================================
// Internal Helpers
// ============================================

/// Derives the one-time Poly1305 key from keystream block 0.
fn one_time_key(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE]) -> [u8; 32] {
    let mut block = chacha20::keystream_block(key, nonce, 0);
    let mut otk = [0u8; 32];
    otk.copy_from_slice(&block[..32]);
    block.zeroize();
    otk
}

/// Assembles the Poly1305 input with 16-byte alignment padding and
/// trailing little-endian lengths.
fn mac_data(aad: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let pad16 = |len: usize| (16 - len % 16) % 16;

    let mut msg =
        Vec::with_capacity(aad.len() + pad16(aad.len()) + ciphertext.len() + pad16(ciphertext.len()) + 16);
    msg.extend_from_slice(aad);
    msg.resize(msg.len() + pad16(aad.len()), 0);
    msg.extend_from_slice(ciphertext);
    msg.resize(msg.len() + pad16(ciphertext.len()), 0);
    msg.extend_from_slice(&(aad.len() as u64).to_le_bytes());
    msg.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    msg
}

// ============================================
// Public API
// ============================================

/// Encrypts `plaintext` into `ciphertext` and writes the tag.
///
/// # Arguments
/// * `ciphertext` - Output buffer, must be exactly `plaintext.len()`
/// * `tag` - Output authentication tag
/// * `plaintext` - Data to encrypt
/// * `key` - 32-byte session key
/// * `nonce` - 12-byte nonce, unique per message under this key
/// * `aad` - Additional authenticated (but not encrypted) data
///
/// # Errors
/// - `BufferMismatch` if the ciphertext buffer length is wrong
pub fn encrypt(
    ciphertext: &mut [u8],
    tag: &mut [u8; TAG_SIZE],
    plaintext: &[u8],
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<()> {
    if ciphertext.len() != plaintext.len() {
        return Err(CryptoError::buffer_mismatch(
            plaintext.len(),
            ciphertext.len(),
        ));
    }

    let mut otk = one_time_key(key, nonce);

    ciphertext.copy_from_slice(plaintext);
    chacha20::xor_stream(ciphertext, key, nonce, 1);

    let mut msg = mac_data(aad, ciphertext);
    *tag = poly1305::auth(&msg, &otk);

    msg.zeroize();
    otk.zeroize();
    Ok(())
}

/// Verifies the tag and decrypts `ciphertext` into `plaintext`.
///
/// The recomputed tag is compared in constant time; on mismatch the
/// function returns `Authentication` without decrypting anything.
///
/// # Errors
/// - `BufferMismatch` if the plaintext buffer length is wrong
/// - `Authentication` if the tag does not match; the plaintext buffer
///   contents are undefined to the caller
pub fn decrypt(
    plaintext: &mut [u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<()> {
    if plaintext.len() != ciphertext.len() {
        return Err(CryptoError::buffer_mismatch(
            ciphertext.len(),
            plaintext.len(),
        ));
    }

    let mut otk = one_time_key(key, nonce);

    let mut msg = mac_data(aad, ciphertext);
    let computed = poly1305::auth(&msg, &otk);

    msg.zeroize();
    otk.zeroize();

    if !constant_time_eq(tag, &computed) {
        return Err(CryptoError::Authentication);
    }

    plaintext.copy_from_slice(ciphertext);
    chacha20::xor_stream(plaintext, key, nonce, 1);
    Ok(())
}

// ============================================
// Tests
// ============================================
