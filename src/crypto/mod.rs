//! Key derivation and the authenticated-encryption schemes of .oxfta containers.
//!
//! The container version byte selects a [`Scheme`]; each scheme is one
//! backend behind the [`AuthenticatedCipher`] trait:
//!
//! | version | scheme      | IV  | auth suffix | key material        |
//! |---------|-------------|-----|-------------|---------------------|
//! | 2       | AES-256-GCM | 12B | 16B tag     | 32B                 |
//! | 3       | AES-256-CBC + HMAC-SHA-256 | 16B | 32B MAC | 64B (enc ‖ mac) |
//!
//! Every call to [`AuthenticatedCipher::seal`] draws a fresh IV from the OS
//! CSPRNG.  Callers never supply IVs for encryption, so an IV cannot be
//! reused under one key by construction.

pub mod cbc_hmac;
pub mod gcm;
pub mod kdf;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

pub use kdf::{derive_key, KeyMaterial, SALT_LEN};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,
    /// Deliberately generic: a wrong passphrase and tampered data look the same.
    #[error("Authentication failed: wrong passphrase or corrupted data")]
    AuthenticationFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength { what: &'static str, expected: usize, actual: usize },
}

// ── Scheme ───────────────────────────────────────────────────────────────────

/// Cryptographic scheme, fixed by the container version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    /// Version 2: single-key AEAD (AES-256-GCM).
    #[default]
    Aead,
    /// Version 3: split-key encrypt-then-MAC (AES-256-CBC + HMAC-SHA-256).
    SplitKey,
}

impl Scheme {
    pub const ALL: [Scheme; 2] = [Scheme::Aead, Scheme::SplitKey];

    /// Resolve a version byte.  `None` for anything this build cannot read.
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            2 => Some(Scheme::Aead),
            3 => Some(Scheme::SplitKey),
            _ => None,
        }
    }

    #[inline]
    pub fn version(self) -> u8 {
        match self {
            Scheme::Aead     => 2,
            Scheme::SplitKey => 3,
        }
    }

    /// Width of the per-encryption IV / nonce.
    #[inline]
    pub fn iv_len(self) -> usize {
        match self {
            Scheme::Aead     => gcm::NONCE_LEN,
            Scheme::SplitKey => cbc_hmac::IV_LEN,
        }
    }

    /// Width of the authentication suffix (GCM tag or HMAC).
    #[inline]
    pub fn tag_len(self) -> usize {
        match self {
            Scheme::Aead     => gcm::TAG_LEN,
            Scheme::SplitKey => cbc_hmac::MAC_LEN,
        }
    }

    /// Bytes of key material the KDF must produce for this scheme.
    #[inline]
    pub fn key_len(self) -> usize {
        match self {
            Scheme::Aead     => gcm::KEY_LEN,
            Scheme::SplitKey => cbc_hmac::ENC_KEY_LEN + cbc_hmac::MAC_KEY_LEN,
        }
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Aead     => "aead",
            Scheme::SplitKey => "split-key",
        }
    }

    /// Parse from a CLI string.  Accepts names and version numbers.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aead" | "gcm" | "2"                 => Some(Scheme::Aead),
            "split-key" | "cbc-hmac" | "3"       => Some(Scheme::SplitKey),
            _                                    => None,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (v{})", self.name(), self.version())
    }
}

// ── Cipher capability ────────────────────────────────────────────────────────

/// Output of one [`AuthenticatedCipher::seal`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub iv:         Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag:        Vec<u8>,
}

impl Sealed {
    /// `ciphertext ‖ tag`, the on-disk blob form.
    pub fn into_blob(self) -> Vec<u8> {
        let mut blob = self.ciphertext;
        blob.extend_from_slice(&self.tag);
        blob
    }
}

/// One authenticated-encryption backend.
///
/// `open` must verify before releasing any plaintext and must fail with
/// [`CryptoError::AuthenticationFailed`] on any mismatch.
pub trait AuthenticatedCipher: Send + Sync {
    fn scheme(&self) -> Scheme;
    fn seal(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError>;
    fn open(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Build the backend for `scheme` from derived key material.
pub fn cipher_for(scheme: Scheme, key: &KeyMaterial) -> Result<Box<dyn AuthenticatedCipher>, CryptoError> {
    match scheme {
        Scheme::Aead     => Ok(Box::new(gcm::GcmCipher::new(key)?)),
        Scheme::SplitKey => Ok(Box::new(cbc_hmac::CbcHmacCipher::new(key)?)),
    }
}

/// Fill a fresh buffer of `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), CryptoError> {
    if expected != actual {
        return Err(CryptoError::InvalidLength { what, expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bytes_resolve() {
        assert_eq!(Scheme::from_version(2), Some(Scheme::Aead));
        assert_eq!(Scheme::from_version(3), Some(Scheme::SplitKey));
        for v in [0u8, 1, 4, 255] {
            assert_eq!(Scheme::from_version(v), None);
        }
        for s in Scheme::ALL {
            assert_eq!(Scheme::from_version(s.version()), Some(s));
            assert_eq!(Scheme::from_name(s.name()), Some(s));
        }
        assert_eq!(Scheme::default().version(), 2);
    }

    #[test]
    fn widths_follow_scheme() {
        assert_eq!((Scheme::Aead.iv_len(), Scheme::Aead.tag_len(), Scheme::Aead.key_len()), (12, 16, 32));
        assert_eq!((Scheme::SplitKey.iv_len(), Scheme::SplitKey.tag_len(), Scheme::SplitKey.key_len()), (16, 32, 64));
    }

    #[test]
    fn both_backends_roundtrip_and_reject_tampering() {
        let salt = [7u8; SALT_LEN];
        for scheme in Scheme::ALL {
            let key = derive_key("correct horse", &salt, scheme).unwrap();
            let cipher = cipher_for(scheme, &key).unwrap();
            assert_eq!(cipher.scheme(), scheme);

            let sealed = cipher.seal(b"attack at dawn").unwrap();
            assert_eq!(sealed.iv.len(), scheme.iv_len());
            assert_eq!(sealed.tag.len(), scheme.tag_len());
            let plain = cipher.open(&sealed.iv, &sealed.ciphertext, &sealed.tag).unwrap();
            assert_eq!(plain, b"attack at dawn");

            let mut bad = sealed.ciphertext.clone();
            bad[0] ^= 0x01;
            assert!(matches!(
                cipher.open(&sealed.iv, &bad, &sealed.tag),
                Err(CryptoError::AuthenticationFailed)
            ));

            let mut bad_iv = sealed.iv.clone();
            bad_iv[0] ^= 0x80;
            assert!(matches!(
                cipher.open(&bad_iv, &sealed.ciphertext, &sealed.tag),
                Err(CryptoError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn seal_never_repeats_iv() {
        let key = derive_key("pw", &[1u8; SALT_LEN], Scheme::SplitKey).unwrap();
        let cipher = cipher_for(Scheme::SplitKey, &key).unwrap();
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
