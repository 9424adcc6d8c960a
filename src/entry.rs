//! Per-file encode/decode: compression policy, then authenticated encryption.
//!
//! A stored blob is `ciphertext ‖ auth suffix`.  The IV and suffix are also
//! carried in the file's [`ManifestEntry`]; the blob's own tail is what gets
//! authenticated, and it must agree with the manifest copy.

use crate::codec::{choose_payload, Codec, CodecError};
use crate::crypto::{AuthenticatedCipher, CryptoError};
use crate::error::ContainerError;
use crate::manifest::ManifestEntry;

/// One encoded file whose data-section offset has not been assigned yet.
#[derive(Debug, Clone)]
pub struct EncodedEntry {
    pub path:       String,
    pub compressed: bool,
    pub iv:         Vec<u8>,
    pub tag:        Vec<u8>,
    pub blob:       Vec<u8>,
    /// Length of the original file (diagnostics only; not stored).
    pub raw_len:    usize,
}

impl EncodedEntry {
    /// Manifest record for this blob placed at `offset`.
    pub fn to_manifest_entry(&self, offset: u64) -> ManifestEntry {
        ManifestEntry {
            path:       self.path.clone(),
            offset,
            length:     self.blob.len() as u64,
            compressed: self.compressed,
            iv:         self.iv.clone(),
            tag:        self.tag.clone(),
        }
    }
}

/// Compress (if the policy allows) and encrypt one file under a fresh IV.
pub fn encode_entry(
    cipher: &dyn AuthenticatedCipher,
    codec:  &dyn Codec,
    path:   &str,
    raw:    &[u8],
) -> Result<EncodedEntry, CryptoError> {
    let (payload, compressed) = choose_payload(codec, path, raw);
    let sealed = cipher.seal(&payload)?;
    let iv  = sealed.iv.clone();
    let tag = sealed.tag.clone();
    Ok(EncodedEntry {
        path: path.to_owned(),
        compressed,
        iv,
        tag,
        blob: sealed.into_blob(),
        raw_len: raw.len(),
    })
}

/// Verify, decrypt and (if flagged) decompress one blob.
///
/// Authentication failures map to [`ContainerError::Integrity`]; a blob
/// that authenticates but does not inflate is a [`ContainerError::Format`].
pub fn decode_entry(
    cipher: &dyn AuthenticatedCipher,
    codec:  &dyn Codec,
    entry:  &ManifestEntry,
    blob:   &[u8],
) -> Result<Vec<u8>, ContainerError> {
    let tag_len = cipher.scheme().tag_len();
    if blob.len() < tag_len || blob.len() as u64 != entry.length {
        return Err(ContainerError::Format(format!(
            "blob for {:?} is {} bytes, manifest says {}",
            entry.path, blob.len(), entry.length
        )));
    }
    let (ciphertext, tag) = blob.split_at(blob.len() - tag_len);
    if tag != entry.tag.as_slice() {
        return Err(ContainerError::Integrity);
    }

    let payload = cipher.open(&entry.iv, ciphertext, tag)?;
    if !entry.compressed {
        return Ok(payload);
    }
    codec.decompress(&payload).map_err(|e| match e {
        CodecError::Io(io) => ContainerError::Io(io),
        other => ContainerError::Format(format!("{:?}: {other}", entry.path)),
    })
}
