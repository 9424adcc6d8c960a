//! Version 2 backend: AES-256-GCM with a detached tag.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};

use super::{check_len, random_bytes, AuthenticatedCipher, CryptoError, KeyMaterial, Scheme, Sealed};

/// Byte length of the AES-GCM nonce.
pub const NONCE_LEN: usize = 12;
/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

pub struct GcmCipher {
    cipher: Aes256Gcm,
}

impl GcmCipher {
    pub fn new(key: &KeyMaterial) -> Result<Self, CryptoError> {
        check_len("key", KEY_LEN, key.len())?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::InvalidLength { what: "key", expected: KEY_LEN, actual: key.len() })?;
        Ok(Self { cipher })
    }
}

impl AuthenticatedCipher for GcmCipher {
    fn scheme(&self) -> Scheme { Scheme::Aead }

    fn seal(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        let iv = random_bytes(NONCE_LEN);
        let mut ciphertext = plaintext.to_vec();
        let tag = self.cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut ciphertext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(Sealed { iv, ciphertext, tag: tag.to_vec() })
    }

    fn open(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_len("nonce", NONCE_LEN, iv.len())?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::AuthenticationFailed);
        }
        // GCM checks the tag before producing plaintext; on failure `buf`
        // still holds ciphertext and is dropped.
        let mut buf = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buf, Tag::from_slice(tag))
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, SALT_LEN};

    fn cipher() -> GcmCipher {
        GcmCipher::new(&derive_key("gcm", &[9u8; SALT_LEN], Scheme::Aead).unwrap()).unwrap()
    }

    #[test]
    fn ciphertext_length_equals_plaintext_length() {
        let sealed = cipher().seal(&[0xAB; 37]).unwrap();
        assert_eq!(sealed.ciphertext.len(), 37);
        assert_eq!(sealed.tag.len(), TAG_LEN);
        assert_eq!(sealed.clone().into_blob().len(), 37 + TAG_LEN);
    }

    #[test]
    fn rejects_flipped_tag() {
        let c = cipher();
        let sealed = c.seal(b"payload").unwrap();
        let mut tag = sealed.tag.clone();
        tag[TAG_LEN - 1] ^= 0x40;
        assert!(matches!(c.open(&sealed.iv, &sealed.ciphertext, &tag), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn rejects_wrong_nonce_width() {
        let c = cipher();
        let sealed = c.seal(b"payload").unwrap();
        assert!(matches!(
            c.open(&sealed.iv[..8], &sealed.ciphertext, &sealed.tag),
            Err(CryptoError::InvalidLength { what: "nonce", .. })
        ));
    }

    #[test]
    fn empty_plaintext_is_authenticated() {
        let c = cipher();
        let sealed = c.seal(b"").unwrap();
        assert!(sealed.ciphertext.is_empty());
        assert_eq!(c.open(&sealed.iv, &sealed.ciphertext, &sealed.tag).unwrap(), b"");
    }
}
