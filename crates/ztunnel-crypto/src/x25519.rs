// ============================================
// File: crates/ztunnel-crypto/src/x25519.rs
// ============================================
//! # X25519 Key Exchange
//!
//! ## Creation Reason
//! Elliptic-curve Diffie-Hellman on Curve25519 (RFC 7748), built on
//! the constant-time field arithmetic in the `fe25519` module.
//!
//! ## Main Functionality
//! - [`scalarmult`]: Montgomery-ladder scalar multiplication
//! - [`clamp_scalar`]: The mandatory scalar bit-masking
//! - [`X25519Keypair`]: Keypair generation and shared-secret derivation
//!
//! ## Main Logical Flow
//! 1. Each side generates a keypair (secret from the OS CSPRNG)
//! 2. Public keys are exchanged out of band
//! 3. `shared_secret` runs the ladder over the peer's public key
//! 4. The 32-byte result feeds HKDF for session keys
//!
//! ## ⚠️ Important Note for Next Developer
//! - The ladder's conditional swap MUST stay mask-based; a branch on
//!   a scalar bit leaks the secret through timing
//! - Secret keys are clamped at generation AND again inside
//!   `scalarmult`; both are required for keys loaded from storage
//!
//! ## Last Modified
//! v0.1.0 - Initial X25519 implementation

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::fe25519::Fe;

// ============================================
// Constants
// ============================================

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of the derived shared secret in bytes.
pub const SHARED_SECRET_SIZE: usize = 32;

/// The curve basepoint u = 9.
pub const BASEPOINT: [u8; 32] = [
    9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// ============================================
// Scalar Operations
// ============================================

/// Clamps a scalar per RFC 7748 §5.
///
/// Clears the low 3 bits (cofactor), clears the top bit, and sets
/// bit 254 so every ladder runs the same number of iterations.
pub fn clamp_scalar(scalar: &mut [u8; 32]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}

/// Multiplies the curve point `point` by `scalar`.
///
/// A copy of the scalar is clamped before use; the caller's buffer is
/// untouched. The ladder walks bits 254 down to 0, swapping the two
/// working points through a mask derived from the current bit.
#[must_use]
pub fn scalarmult(scalar: &[u8; 32], point: &[u8; 32]) -> [u8; 32] {
    let mut e = *scalar;
    clamp_scalar(&mut e);

    let x1 = Fe::from_bytes(point);
    let mut x2 = Fe::ONE;
    let mut z2 = Fe::ZERO;
    let mut x3 = x1;
    let mut z3 = Fe::ONE;

    let mut swap: i64 = 0;
    for pos in (0..=254usize).rev() {
        let b = i64::from((e[pos >> 3] >> (pos & 7)) & 1);
        swap ^= b;
        Fe::cswap(&mut x2, &mut x3, swap);
        Fe::cswap(&mut z2, &mut z3, swap);
        swap = b;

        // One ladder step: differential add + double, 5 full
        // multiplications plus the 121666 constant multiplication.
        let mut tmp0 = x3.sub(&z3);
        let mut tmp1 = x2.sub(&z2);
        x2 = x2.add(&z2);
        z2 = x3.add(&z3);
        z3 = tmp0.mul(&x2);
        z2 = z2.mul(&tmp1);
        tmp0 = tmp1.square();
        tmp1 = x2.square();
        x3 = z3.add(&z2);
        z2 = z3.sub(&z2);
        x2 = tmp1.mul(&tmp0);
        tmp1 = tmp1.sub(&tmp0);
        z2 = z2.square();
        z3 = tmp1.mul(&Fe::N121666);
        x3 = x3.square();
        tmp0 = tmp0.add(&z3);
        z3 = x1.mul(&z2);
        z2 = tmp1.mul(&tmp0);
    }

    Fe::cswap(&mut x2, &mut x3, swap);
    Fe::cswap(&mut z2, &mut z3, swap);

    let out = x2.mul(&z2.invert()).to_bytes();
    e.zeroize();
    out
}

// ============================================
// X25519Keypair
// ============================================

/// An X25519 keypair.
///
/// # Security
/// - The secret key is filled from the operating system CSPRNG and
///   clamped before storage
/// - The secret key is zeroed on drop
/// - An entropy source failure aborts the process; there is no
///   fallback generator
///
/// # Example
/// ```
/// use ztunnel_crypto::x25519::X25519Keypair;
///
/// let alice = X25519Keypair::generate();
/// let bob = X25519Keypair::generate();
///
/// let s1 = alice.shared_secret(bob.public_key());
/// let s2 = bob.shared_secret(alice.public_key());
/// assert_eq!(s1.as_bytes(), s2.as_bytes());
/// ```
pub struct X25519Keypair {
    /// Public curve point, u-coordinate encoding
    public_key: [u8; PUBLIC_KEY_SIZE],
    /// Clamped secret scalar
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl X25519Keypair {
    /// Generates a new keypair from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        let mut secret_key = [0u8; SECRET_KEY_SIZE];
        OsRng.fill_bytes(&mut secret_key);
        clamp_scalar(&mut secret_key);

        let public_key = scalarmult(&secret_key, &BASEPOINT);
        Self {
            public_key,
            secret_key,
        }
    }

    /// Reconstructs a keypair from a stored secret key.
    ///
    /// The scalar is clamped and the public key recomputed, so the
    /// input does not need to be pre-clamped.
    #[must_use]
    pub fn from_secret(mut secret_key: [u8; SECRET_KEY_SIZE]) -> Self {
        clamp_scalar(&mut secret_key);
        let public_key = scalarmult(&secret_key, &BASEPOINT);
        Self {
            public_key,
            secret_key,
        }
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    /// Derives the shared secret with a peer's public key.
    #[must_use]
    pub fn shared_secret(&self, peer_public: &[u8; PUBLIC_KEY_SIZE]) -> SharedSecret {
        SharedSecret(scalarmult(&self.secret_key, peer_public))
    }
}

impl Drop for X25519Keypair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for X25519Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret key intentionally omitted
        f.debug_struct("X25519Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// ============================================
// SharedSecret
// ============================================

/// The 32-byte output of an X25519 exchange.
///
/// Zeroed on drop. Feed this to HKDF; never use it directly as an
/// encryption key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Returns the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn arr32(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_rfc7748_vector_1() {
        let scalar = arr32("a546e36bf0527c9d3b16154b82465edd62144c0ac1fc5a18506a2244ba449ac4");
        let point = arr32("e6db6867583030db3594c1a424b15f7c726624ec26b3353b10a903a6d0ab1c4c");
        let expected = arr32("c3da55379de9c6908e94ea4df28d084f32eccf03491c71f754b4075577a28552");
        assert_eq!(scalarmult(&scalar, &point), expected);
    }

    #[test]
    fn test_rfc7748_vector_2() {
        // The u-coordinate here has its top bit set, exercising the
        // mask in field deserialization.
        let scalar = arr32("4b66e9d4d1b4673c5ad22691957d6af5c11b6421e0ea01d42ca4169e7918ba0d");
        let point = arr32("e5210f12786811d3f4b7959d0538ae2c31dbe7106fc03c3efc4cd549c715a493");
        let expected = arr32("95cbde9476e8907d7aade45cb4b873f88b595a68799fa152e6f8f7647aac7957");
        assert_eq!(scalarmult(&scalar, &point), expected);
    }

    #[test]
    fn test_rfc7748_ladder_first_iteration() {
        let k = BASEPOINT;
        let u = BASEPOINT;
        let expected = arr32("422c8e7a6227d7bca1350b3e2bb7279f7897b87bb6854b783c60e80311ae3079");
        assert_eq!(scalarmult(&k, &u), expected);
    }

    #[test]
    fn test_rfc7748_diffie_hellman() {
        let alice_secret = arr32("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let alice_public = arr32("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a");
        let bob_secret = arr32("5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb");
        let bob_public = arr32("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");
        let shared = arr32("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742");

        assert_eq!(scalarmult(&alice_secret, &BASEPOINT), alice_public);
        assert_eq!(scalarmult(&bob_secret, &BASEPOINT), bob_public);
        assert_eq!(scalarmult(&alice_secret, &bob_public), shared);
        assert_eq!(scalarmult(&bob_secret, &alice_public), shared);
    }

    #[test]
    fn test_keypair_agreement() {
        let alice = X25519Keypair::generate();
        let bob = X25519Keypair::generate();

        let s1 = alice.shared_secret(bob.public_key());
        let s2 = bob.shared_secret(alice.public_key());
        assert_eq!(s1.as_bytes(), s2.as_bytes());
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = X25519Keypair::generate();
        let b = X25519Keypair::generate();
        assert_ne!(a.public_key(), b.public_key());
        // Public key must never equal the (clamped) secret scalar
        assert_ne!(a.public_key(), &a.secret_key);
    }

    #[test]
    fn test_from_secret_clamps() {
        let kp = X25519Keypair::from_secret([0xff; 32]);
        assert_eq!(kp.secret_key[0] & 7, 0);
        assert_eq!(kp.secret_key[31] & 0x80, 0);
        assert_eq!(kp.secret_key[31] & 0x40, 0x40);
    }

    #[test]
    fn test_clamp_scalar() {
        let mut s = [0xffu8; 32];
        clamp_scalar(&mut s);
        assert_eq!(s[0], 248);
        assert_eq!(s[31], 127);
    }
}
