//! Fixed container header.
//!
//! ```text
//! offset  size   field
//! 0       8      magic "OXFTA1\0\0"
//! 8       1      version (2 = AEAD, 3 = split-key)
//! 9       16     salt
//! 25      12|16  manifest IV (width set by version)
//! 37|41   4      manifest length, u32 BE = ciphertext + auth suffix
//! ```
//!
//! The sealed manifest follows immediately, then the data section.  The
//! version byte is checked before anything after it is read.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::crypto::{Scheme, SALT_LEN};

pub const MAGIC: &[u8; 8] = b"OXFTA1\0\0";

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("Manifest IV is {actual} bytes, version {version} needs {expected}")]
    IvLength { version: u8, expected: usize, actual: usize },
    #[error("Manifest of {0} bytes does not fit the 32-bit length field")]
    ManifestTooLarge(usize),
    #[error("Manifest length {len} is shorter than its {suffix}-byte auth suffix")]
    ManifestTooShort { len: u32, suffix: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub scheme:       Scheme,
    pub salt:         [u8; SALT_LEN],
    pub manifest_iv:  Vec<u8>,
    /// Sealed manifest length including its auth suffix.
    pub manifest_len: u32,
}

impl ContainerHeader {
    pub fn new(scheme: Scheme, salt: [u8; SALT_LEN], manifest_iv: Vec<u8>, manifest_len: usize) -> Result<Self, HeaderError> {
        if manifest_iv.len() != scheme.iv_len() {
            return Err(HeaderError::IvLength {
                version:  scheme.version(),
                expected: scheme.iv_len(),
                actual:   manifest_iv.len(),
            });
        }
        let manifest_len = u32::try_from(manifest_len)
            .map_err(|_| HeaderError::ManifestTooLarge(manifest_len))?;
        Ok(Self { scheme, salt, manifest_iv, manifest_len })
    }

    /// Encoded size of this header in bytes.
    pub fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.scheme)
    }

    pub fn encoded_len_for(scheme: Scheme) -> usize {
        MAGIC.len() + 1 + SALT_LEN + scheme.iv_len() + 4
    }

    /// Length of the manifest ciphertext without its auth suffix.
    pub fn manifest_ciphertext_len(&self) -> usize {
        self.manifest_len as usize - self.scheme.tag_len()
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(self.scheme.version())?;
        writer.write_all(&self.salt)?;
        writer.write_all(&self.manifest_iv)?;
        writer.write_u32::<BigEndian>(self.manifest_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HeaderError::InvalidMagic);
        }
        let version = reader.read_u8()?;
        let scheme = Scheme::from_version(version)
            .ok_or(HeaderError::UnsupportedVersion(version))?;

        let mut salt = [0u8; SALT_LEN];
        reader.read_exact(&mut salt)?;
        let mut manifest_iv = vec![0u8; scheme.iv_len()];
        reader.read_exact(&mut manifest_iv)?;
        let manifest_len = reader.read_u32::<BigEndian>()?;
        if (manifest_len as usize) < scheme.tag_len() {
            return Err(HeaderError::ManifestTooShort { len: manifest_len, suffix: scheme.tag_len() });
        }

        Ok(Self { scheme, salt, manifest_iv, manifest_len })
    }
}
