//! scrypt key stretching.
//!
//! Cost parameters are not stored in the header, so they are frozen for
//! every container version this build writes.

use std::fmt;

use zeroize::Zeroizing;

use super::{CryptoError, Scheme};

/// Length of the per-archive salt stored in the header.
pub const SALT_LEN: usize = 16;

/// scrypt cost: N = 2^14.
pub const SCRYPT_LOG_N: u8 = 14;
/// scrypt block size.
pub const SCRYPT_R: u32 = 8;
/// scrypt parallelism.
pub const SCRYPT_P: u32 = 1;

/// Derived key bytes.  Zeroized on drop; `Debug` never prints the contents.
pub struct KeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED; {}])", self.bytes.len())
    }
}

/// Derive `scheme.key_len()` bytes from `passphrase` and `salt`.
///
/// Deterministic: the same inputs always give the same key, which is what
/// lets a reader rebuild the key from the salt in the header.
pub fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN], scheme: Scheme) -> Result<KeyMaterial, CryptoError> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, scheme.key_len())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let mut bytes = Zeroizing::new(vec![0u8; scheme.key_len()]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(KeyMaterial { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = [0x42u8; SALT_LEN];
        let a = derive_key("secret", &salt, Scheme::Aead).unwrap();
        let b = derive_key("secret", &salt, Scheme::Aead).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn salt_and_passphrase_both_matter() {
        let k1 = derive_key("secret", &[1u8; SALT_LEN], Scheme::SplitKey).unwrap();
        let k2 = derive_key("secret", &[2u8; SALT_LEN], Scheme::SplitKey).unwrap();
        let k3 = derive_key("wrong", &[1u8; SALT_LEN], Scheme::SplitKey).unwrap();
        assert_eq!(k1.len(), 64);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let k = derive_key("secret", &[0u8; SALT_LEN], Scheme::Aead).unwrap();
        let shown = format!("{k:?}");
        assert!(shown.contains("REDACTED"));
        assert!(!shown.contains(&hex::encode(k.as_bytes())));
    }
}
