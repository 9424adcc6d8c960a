//! The manifest: the ordered index of every entry in a container.
//!
//! On disk the manifest only ever exists sealed by the archive's
//! [`AuthenticatedCipher`] under its own IV.  The plaintext is pretty JSON
//! with a fixed field order, so two manifests for the same tree diff cleanly:
//!
//! ```json
//! {
//!   "files": [
//!     { "path": "a.txt", "offset": 0, "length": 25, "compressed": true,
//!       "iv": "…base64…", "tag": "…base64…" }
//!   ]
//! }
//! ```
//!
//! `offset` is relative to the start of the data section.  `length` is the
//! blob length including its authentication suffix.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{AuthenticatedCipher, CryptoError, Scheme, Sealed};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("Invalid manifest entry {path:?}: {reason}")]
    InvalidEntry { path: String, reason: String },
    #[error("Duplicate manifest path {0:?}")]
    DuplicatePath(String),
    #[error("Manifest covers {covered} data bytes but the data section holds {actual}")]
    DataSizeMismatch { covered: u64, actual: u64 },
}

// ── ManifestEntry ────────────────────────────────────────────────────────────

/// Location and crypto parameters for one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative path with `/` separators.
    pub path:       String,
    pub offset:     u64,
    pub length:     u64,
    pub compressed: bool,
    #[serde(with = "b64")]
    pub iv:         Vec<u8>,
    #[serde(with = "b64")]
    pub tag:        Vec<u8>,
}

impl ManifestEntry {
    /// One past the last data-section byte of this entry's blob.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    fn invalid(&self, reason: impl Into<String>) -> ManifestError {
        ManifestError::InvalidEntry { path: self.path.clone(), reason: reason.into() }
    }
}

// ── Manifest ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize and encrypt as one unit under a fresh IV.
    pub fn seal(&self, cipher: &dyn AuthenticatedCipher) -> Result<Sealed, ManifestError> {
        let plain = self.to_bytes()?;
        Ok(cipher.seal(&plain)?)
    }

    /// Authenticate, decrypt and parse.  Nothing is parsed unless the
    /// authentication check passed.
    pub fn open(
        cipher:     &dyn AuthenticatedCipher,
        iv:         &[u8],
        ciphertext: &[u8],
        tag:        &[u8],
    ) -> Result<Self, ManifestError> {
        let plain = cipher.open(iv, ciphertext, tag)?;
        Ok(Self::from_bytes(&plain)?)
    }

    /// Total bytes of data section described by the entries.
    pub fn data_len(&self) -> u64 {
        self.files.iter().map(|e| e.length).sum()
    }

    /// Structural checks on an authenticated manifest.
    ///
    /// Paths must be safe relative paths and unique; IV and tag widths must
    /// match `scheme`; blobs must be laid out back to back from offset 0 in
    /// index order and exactly fill `data_section_len`.
    pub fn validate(&self, scheme: Scheme, data_section_len: u64) -> Result<(), ManifestError> {
        let mut seen = HashSet::with_capacity(self.files.len());
        let mut expected_offset = 0u64;

        for e in &self.files {
            check_path(e)?;
            if !seen.insert(e.path.as_str()) {
                return Err(ManifestError::DuplicatePath(e.path.clone()));
            }
            if e.iv.len() != scheme.iv_len() {
                return Err(e.invalid(format!("IV is {} bytes, expected {}", e.iv.len(), scheme.iv_len())));
            }
            if e.tag.len() != scheme.tag_len() {
                return Err(e.invalid(format!("tag is {} bytes, expected {}", e.tag.len(), scheme.tag_len())));
            }
            if e.length < scheme.tag_len() as u64 {
                return Err(e.invalid(format!("blob of {} bytes is shorter than its auth suffix", e.length)));
            }
            if e.offset != expected_offset {
                return Err(e.invalid(format!("offset {} does not follow previous blob end {}", e.offset, expected_offset)));
            }
            expected_offset = e.offset
                .checked_add(e.length)
                .ok_or_else(|| e.invalid("offset + length overflows"))?;
        }

        if expected_offset != data_section_len {
            return Err(ManifestError::DataSizeMismatch { covered: expected_offset, actual: data_section_len });
        }
        Ok(())
    }
}

fn check_path(e: &ManifestEntry) -> Result<(), ManifestError> {
    validate_path(&e.path).map_err(|reason| e.invalid(reason))
}

/// Accept only canonical relative paths: `/`-separated, no empty, `.` or
/// `..` segments.  Two distinct accepted strings always name distinct output
/// files, so uniqueness can be checked on the string itself.  Returns the
/// reason on rejection.
pub fn validate_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("empty path");
    }
    if path.contains('\\') || path.contains('\0') {
        return Err("path contains a backslash or NUL");
    }
    if path.starts_with('/') {
        return Err("path is absolute");
    }
    for segment in path.split('/') {
        match segment {
            ""   => return Err("path has an empty segment"),
            "."  => return Err("path has a '.' segment"),
            ".." => return Err("path escapes the output folder"),
            _    => {}
        }
    }
    Ok(())
}

/// Standard base64 for byte fields.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{cipher_for, derive_key, SALT_LEN};

    fn entry(path: &str, offset: u64, length: u64) -> ManifestEntry {
        ManifestEntry {
            path: path.into(),
            offset,
            length,
            compressed: false,
            iv: vec![1u8; 12],
            tag: vec![2u8; 16],
        }
    }

    fn two_entries() -> Manifest {
        Manifest { files: vec![entry("a.txt", 0, 20), entry("dir/b.bin", 20, 32)] }
    }

    #[test]
    fn json_has_fixed_field_order_and_base64() {
        let text = String::from_utf8(two_entries().to_bytes().unwrap()).unwrap();
        let p = text.find("\"path\"").unwrap();
        let o = text.find("\"offset\"").unwrap();
        let l = text.find("\"length\"").unwrap();
        let c = text.find("\"compressed\"").unwrap();
        let i = text.find("\"iv\"").unwrap();
        let t = text.find("\"tag\"").unwrap();
        assert!(p < o && o < l && l < c && c < i && i < t);
        assert!(text.contains("\"AQEBAQEBAQEBAQEB\""));
        assert_eq!(Manifest::from_bytes(text.as_bytes()).unwrap(), two_entries());
    }

    #[test]
    fn serialization_is_deterministic() {
        assert_eq!(two_entries().to_bytes().unwrap(), two_entries().to_bytes().unwrap());
    }

    #[test]
    fn validate_accepts_contiguous_layout() {
        two_entries().validate(Scheme::Aead, 52).unwrap();
        Manifest::default().validate(Scheme::Aead, 0).unwrap();
    }

    #[test]
    fn validate_rejects_gaps_overlaps_and_size_mismatch() {
        let gap = Manifest { files: vec![entry("a", 0, 20), entry("b", 24, 20)] };
        assert!(matches!(gap.validate(Scheme::Aead, 44), Err(ManifestError::InvalidEntry { .. })));

        let overlap = Manifest { files: vec![entry("a", 0, 20), entry("b", 10, 20)] };
        assert!(matches!(overlap.validate(Scheme::Aead, 30), Err(ManifestError::InvalidEntry { .. })));

        assert!(matches!(
            two_entries().validate(Scheme::Aead, 60),
            Err(ManifestError::DataSizeMismatch { covered: 52, actual: 60 })
        ));
    }

    #[test]
    fn validate_rejects_unsafe_and_duplicate_paths() {
        for bad in ["../etc/passwd", "/abs", "a/../../b", "", "win\\path"] {
            let m = Manifest { files: vec![entry(bad, 0, 16)] };
            assert!(m.validate(Scheme::Aead, 16).is_err(), "{bad:?} accepted");
        }
        let dup = Manifest { files: vec![entry("x", 0, 16), entry("x", 16, 16)] };
        assert!(matches!(dup.validate(Scheme::Aead, 32), Err(ManifestError::DuplicatePath(_))));
    }

    #[test]
    fn aliased_spellings_of_one_path_are_rejected() {
        for alias in ["./a/b.bin", "a//b.bin", "a/./b.bin", "a/b.bin/", "a/b/../b.bin"] {
            assert!(validate_path(alias).is_err(), "{alias:?} accepted");
            let m = Manifest { files: vec![entry("a/b.bin", 0, 16), entry(alias, 16, 16)] };
            assert!(matches!(m.validate(Scheme::Aead, 32), Err(ManifestError::InvalidEntry { .. })));
        }
        validate_path("a/b.bin").unwrap();
        validate_path(".hidden/x..y").unwrap();
    }

    #[test]
    fn validate_checks_widths_against_scheme() {
        assert!(matches!(two_entries().validate(Scheme::SplitKey, 52), Err(ManifestError::InvalidEntry { .. })));
        let short = Manifest { files: vec![entry("a", 0, 15)] };
        assert!(short.validate(Scheme::Aead, 15).is_err());
    }

    #[test]
    fn sealed_manifest_opens_only_with_same_key() {
        let salt = [5u8; SALT_LEN];
        for scheme in Scheme::ALL {
            let cipher = cipher_for(scheme, &derive_key("pw", &salt, scheme).unwrap()).unwrap();
            let sealed = two_entries().seal(cipher.as_ref()).unwrap();
            let back = Manifest::open(cipher.as_ref(), &sealed.iv, &sealed.ciphertext, &sealed.tag).unwrap();
            assert_eq!(back, two_entries());

            let other = cipher_for(scheme, &derive_key("nope", &salt, scheme).unwrap()).unwrap();
            assert!(matches!(
                Manifest::open(other.as_ref(), &sealed.iv, &sealed.ciphertext, &sealed.tag),
                Err(ManifestError::Crypto(CryptoError::AuthenticationFailed))
            ));
        }
    }

    #[test]
    fn bad_base64_is_a_parse_error() {
        let text = br#"{"files":[{"path":"a","offset":0,"length":16,"compressed":false,"iv":"!!","tag":"AA=="}]}"#;
        assert!(Manifest::from_bytes(text).is_err());
    }
}
