// ============================================
// File: crates/ztunnel-crypto/src/session.rs
// ============================================
//! # Session Key Schedule
//!
//! ## Creation Reason
//! Bridges the raw primitives into the per-tunnel state the relay and
//! client actually hold: a derived session key plus the nonce counter
//! that keeps every AEAD invocation unique.
//!
//! ## Main Functionality
//! - [`SessionKey`]: 32-byte symmetric key, zeroed on drop
//! - [`Session`]: key + monotonic nonce counter, with `seal`/`open`
//!
//! ## Main Logical Flow
//! 1. X25519 exchange produces a shared secret
//! 2. `Session::new` expands it through HKDF-SHA256 with the
//!    `ztunnel-session-v1` context
//! 3. Each `seal` consumes one nonce; `open` takes the nonce from the
//!    peer's message header
//!
//! ## ⚠️ Important Note for Next Developer
//! - The nonce counter must NEVER be reset or rewound for a live key;
//!   a repeated (key, nonce) pair breaks both confidentiality and
//!   unforgeability
//! - Counter overflow is the caller's rekey signal, not handled here
//!
//! ## Last Modified
//! v0.1.0 - Initial session schedule

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead;
use crate::error::Result;
use crate::hkdf;

// ============================================
// Constants
// ============================================

/// HKDF context string binding derived keys to this protocol version.
pub const SESSION_INFO: &[u8] = b"ztunnel-session-v1";

/// Size of a derived session key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

// ============================================
// SessionKey
// ============================================

/// A derived symmetric session key.
///
/// # Security
/// - Zeroed on drop
/// - Not `Clone`: exactly one owner per key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes intentionally omitted
        f.write_str("SessionKey(..)")
    }
}

// ============================================
// Session
// ============================================

/// Encrypted-session state: a session key and a nonce counter.
///
/// # Example
/// ```
/// use ztunnel_crypto::session::Session;
///
/// let shared_secret = [0x42u8; 32];
/// let mut tx = Session::new(&shared_secret).unwrap();
/// let rx = Session::new(&shared_secret).unwrap();
///
/// let (ciphertext, nonce, tag) = tx.seal(b"payload", b"").unwrap();
/// let plaintext = rx.open(&ciphertext, &nonce, &tag, b"").unwrap();
/// assert_eq!(plaintext, b"payload");
/// ```
pub struct Session {
    /// Derived symmetric key
    key: SessionKey,
    /// Next nonce counter value
    nonce_counter: u64,
}

impl Session {
    /// Derives a session from an X25519 shared secret.
    ///
    /// # Errors
    /// Key derivation only fails on oversized output requests, which
    /// cannot happen for the fixed key size; the `Result` is kept so
    /// the signature survives future schedule changes.
    pub fn new(shared_secret: &[u8; 32]) -> Result<Self> {
        let mut key = [0u8; SESSION_KEY_SIZE];
        hkdf::hkdf_sha256(&mut key, shared_secret, None, SESSION_INFO)?;

        debug!("session key derived");
        Ok(Self {
            key: SessionKey::from_bytes(key),
            nonce_counter: 0,
        })
    }

    /// Returns the next unique nonce.
    ///
    /// The counter occupies bytes 4..12 little-endian; the leading 4
    /// bytes stay zero.
    pub fn next_nonce(&mut self) -> [u8; aead::NONCE_SIZE] {
        let mut nonce = [0u8; aead::NONCE_SIZE];
        nonce[4..12].copy_from_slice(&self.nonce_counter.to_le_bytes());
        self.nonce_counter += 1;
        nonce
    }

    /// Number of messages sealed so far.
    #[must_use]
    pub const fn messages_sealed(&self) -> u64 {
        self.nonce_counter
    }

    /// Encrypts a message under the next nonce.
    ///
    /// Returns `(ciphertext, nonce, tag)`; the nonce travels with the
    /// message so the peer can open it.
    ///
    /// # Errors
    /// Propagates AEAD buffer errors (none for well-formed inputs).
    pub fn seal(
        &mut self,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, [u8; aead::NONCE_SIZE], [u8; aead::TAG_SIZE])> {
        let nonce = self.next_nonce();
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; aead::TAG_SIZE];
        aead::encrypt(
            &mut ciphertext,
            &mut tag,
            plaintext,
            self.key.as_bytes(),
            &nonce,
            aad,
        )?;
        Ok((ciphertext, nonce, tag))
    }

    /// Verifies and decrypts a message.
    ///
    /// # Errors
    /// - `Authentication` if the ciphertext, tag, nonce or AAD do not
    ///   match what the peer sealed
    pub fn open(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; aead::NONCE_SIZE],
        tag: &[u8; aead::TAG_SIZE],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let mut plaintext = vec![0u8; ciphertext.len()];
        aead::decrypt(
            &mut plaintext,
            ciphertext,
            tag,
            self.key.as_bytes(),
            nonce,
            aad,
        )?;
        Ok(plaintext)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("nonce_counter", &self.nonce_counter)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use crate::x25519::X25519Keypair;

    #[test]
    fn test_same_secret_same_key() {
        let secret = [0x42u8; 32];
        let s1 = Session::new(&secret).unwrap();
        let s2 = Session::new(&secret).unwrap();
        assert_eq!(s1.key.as_bytes(), s2.key.as_bytes());
    }

    #[test]
    fn test_nonce_sequence() {
        let mut session = Session::new(&[0u8; 32]).unwrap();
        let n0 = session.next_nonce();
        let n1 = session.next_nonce();
        assert_ne!(n0, n1);
        assert_eq!(&n0[..4], &[0, 0, 0, 0]);
        assert_eq!(n0[4], 0);
        assert_eq!(n1[4], 1);
        assert_eq!(session.messages_sealed(), 2);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let secret = [0x13u8; 32];
        let mut tx = Session::new(&secret).unwrap();
        let rx = Session::new(&secret).unwrap();

        for msg in [&b"first"[..], b"second", b""] {
            let (ct, nonce, tag) = tx.seal(msg, b"hdr").unwrap();
            assert_eq!(rx.open(&ct, &nonce, &tag, b"hdr").unwrap(), msg);
        }
    }

    #[test]
    fn test_replayed_nonce_differs_from_next(){
        let mut tx = Session::new(&[9u8; 32]).unwrap();
        let (ct1, n1, _) = tx.seal(b"same payload", b"").unwrap();
        let (ct2, n2, _) = tx.seal(b"same payload", b"").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_open_rejects_wrong_session() {
        let mut tx = Session::new(&[1u8; 32]).unwrap();
        let rx = Session::new(&[2u8; 32]).unwrap();

        let (ct, nonce, tag) = tx.seal(b"payload", b"").unwrap();
        assert_eq!(
            rx.open(&ct, &nonce, &tag, b"").unwrap_err(),
            CryptoError::Authentication
        );
    }

    #[test]
    fn test_end_to_end_key_exchange() {
        let alice = X25519Keypair::generate();
        let bob = X25519Keypair::generate();

        let mut alice_session =
            Session::new(alice.shared_secret(bob.public_key()).as_bytes()).unwrap();
        let bob_session =
            Session::new(bob.shared_secret(alice.public_key()).as_bytes()).unwrap();

        let (ct, nonce, tag) = alice_session.seal(b"tunnel up", b"v1").unwrap();
        assert_eq!(
            bob_session.open(&ct, &nonce, &tag, b"v1").unwrap(),
            b"tunnel up"
        );
    }
}
