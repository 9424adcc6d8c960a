//! Version 3 backend: AES-256-CBC (PKCS#7) then HMAC-SHA-256 over `IV ‖ ciphertext`.
//!
//! Key material is 64 bytes: the first half keys AES, the second half keys
//! the MAC.  `open` verifies the MAC in constant time and only then runs the
//! block cipher, so a forged blob never reaches the padding check.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{check_len, random_bytes, AuthenticatedCipher, CryptoError, KeyMaterial, Scheme, Sealed};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Byte length of the CBC initialisation vector.
pub const IV_LEN: usize = 16;
/// Byte length of the HMAC-SHA-256 output.
pub const MAC_LEN: usize = 32;
pub const ENC_KEY_LEN: usize = 32;
pub const MAC_KEY_LEN: usize = 32;

pub struct CbcHmacCipher {
    enc_key: Zeroizing<[u8; ENC_KEY_LEN]>,
    mac_key: Zeroizing<[u8; MAC_KEY_LEN]>,
}

impl CbcHmacCipher {
    pub fn new(key: &KeyMaterial) -> Result<Self, CryptoError> {
        check_len("key", ENC_KEY_LEN + MAC_KEY_LEN, key.len())?;
        let (enc, mac) = key.as_bytes().split_at(ENC_KEY_LEN);
        let mut enc_key = Zeroizing::new([0u8; ENC_KEY_LEN]);
        let mut mac_key = Zeroizing::new([0u8; MAC_KEY_LEN]);
        enc_key.copy_from_slice(enc);
        mac_key.copy_from_slice(mac);
        Ok(Self { enc_key, mac_key })
    }

    fn mac(&self, iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha256, CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.mac_key.as_slice())
            .map_err(|_| CryptoError::InvalidLength { what: "MAC key", expected: MAC_KEY_LEN, actual: self.mac_key.len() })?;
        mac.update(iv);
        mac.update(ciphertext);
        Ok(mac)
    }
}

impl AuthenticatedCipher for CbcHmacCipher {
    fn scheme(&self) -> Scheme { Scheme::SplitKey }

    fn seal(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        let iv = random_bytes(IV_LEN);
        let ciphertext = Aes256CbcEnc::new_from_slices(self.enc_key.as_slice(), &iv)
            .map_err(|_| CryptoError::EncryptionFailed)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let tag = self.mac(&iv, &ciphertext)?.finalize().into_bytes().to_vec();
        Ok(Sealed { iv, ciphertext, tag })
    }

    fn open(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_len("IV", IV_LEN, iv.len())?;
        self.mac(iv, ciphertext)?
            .verify_slice(tag)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        // Authentic input with bad padding can only come from a writer bug;
        // it is still reported through the single integrity error.
        Aes256CbcDec::new_from_slices(self.enc_key.as_slice(), iv)
            .map_err(|_| CryptoError::AuthenticationFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, SALT_LEN};

    fn cipher() -> CbcHmacCipher {
        CbcHmacCipher::new(&derive_key("cbc", &[3u8; SALT_LEN], Scheme::SplitKey).unwrap()).unwrap()
    }

    #[test]
    fn ciphertext_is_padded_to_block() {
        let c = cipher();
        assert_eq!(c.seal(&[0u8; 15]).unwrap().ciphertext.len(), 16);
        assert_eq!(c.seal(&[0u8; 16]).unwrap().ciphertext.len(), 32);
        assert_eq!(c.seal(b"").unwrap().ciphertext.len(), 16);
    }

    #[test]
    fn mac_covers_iv() {
        let c = cipher();
        let sealed = c.seal(b"bound to its iv").unwrap();
        let mut iv = sealed.iv.clone();
        iv[IV_LEN - 1] ^= 1;
        assert!(matches!(c.open(&iv, &sealed.ciphertext, &sealed.tag), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn truncated_mac_is_rejected() {
        let c = cipher();
        let sealed = c.seal(b"x").unwrap();
        assert!(matches!(
            c.open(&sealed.iv, &sealed.ciphertext, &sealed.tag[..16]),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn halves_are_independent_keys() {
        let key = derive_key("cbc", &[3u8; SALT_LEN], Scheme::SplitKey).unwrap();
        let (enc, mac) = key.as_bytes().split_at(ENC_KEY_LEN);
        assert_ne!(enc, mac);
    }

    #[test]
    fn rejects_short_key_material() {
        let short = derive_key("cbc", &[3u8; SALT_LEN], Scheme::Aead).unwrap();
        assert!(matches!(CbcHmacCipher::new(&short), Err(CryptoError::InvalidLength { what: "key", .. })));
    }
}
