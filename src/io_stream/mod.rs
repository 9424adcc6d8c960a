//! Container framing — writer and reader.
//!
//! # Writer
//! [`ContainerWriter`] derives the key once, then accepts files one at a
//! time.  Each file is compressed (per policy), encrypted under a fresh IV,
//! and appended to a data spool; its offset is the running total of all
//! earlier blob lengths.  [`ContainerWriter::finalize`] seals the manifest,
//! writes header → sealed manifest → data section, and returns the sink.
//!
//! The spool is an anonymous temporary file, so a sequential pack only ever
//! holds one source file in memory.
//!
//! # Reader
//! [`ContainerReader::open`] parses the header (magic, then version, both
//! before any key derivation), derives the key, reads exactly the sealed
//! manifest, and authenticates it.  Only an authentic, structurally valid
//! manifest is ever used to address the data section.
//!
//! # Endianness
//! The single multi-byte header field is big-endian; see `header.rs`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::codec::{Codec, DeflateCodec};
use crate::crypto::{cipher_for, derive_key, random_bytes, AuthenticatedCipher, Scheme, SALT_LEN};
use crate::entry::{decode_entry, encode_entry, EncodedEntry};
use crate::error::ContainerError;
use crate::fsio::RangeReader;
use crate::header::ContainerHeader;
use crate::manifest::{validate_path, Manifest, ManifestEntry};

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ContainerWriter<W: Write> {
    writer:   W,
    scheme:   Scheme,
    salt:     [u8; SALT_LEN],
    cipher:   Box<dyn AuthenticatedCipher>,
    codec:    DeflateCodec,
    entries:  Vec<ManifestEntry>,
    paths:    HashSet<String>,
    spool:    File,
    data_len: u64,
}

impl<W: Write> ContainerWriter<W> {
    /// Generate a salt and derive the archive key for `scheme`.
    pub fn new(writer: W, passphrase: &str, scheme: Scheme) -> Result<Self, ContainerError> {
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&random_bytes(SALT_LEN));
        Self::with_salt(writer, passphrase, scheme, salt)
    }

    fn with_salt(writer: W, passphrase: &str, scheme: Scheme, salt: [u8; SALT_LEN]) -> Result<Self, ContainerError> {
        let key = derive_key(passphrase, &salt, scheme)?;
        let cipher = cipher_for(scheme, &key)?;
        Ok(Self {
            writer,
            scheme,
            salt,
            cipher,
            codec:    DeflateCodec::default(),
            entries:  Vec::new(),
            paths:    HashSet::new(),
            spool:    tempfile::tempfile()?,
            data_len: 0,
        })
    }

    pub fn scheme(&self) -> Scheme { self.scheme }

    /// The archive's cipher, for encoding entries off-thread.
    pub fn cipher(&self) -> &dyn AuthenticatedCipher { self.cipher.as_ref() }

    pub fn codec(&self) -> &dyn Codec { &self.codec }

    /// Entries recorded so far, in write order.
    pub fn entries(&self) -> &[ManifestEntry] { &self.entries }

    /// Compress, encrypt and append one file.
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<&ManifestEntry, ContainerError> {
        self.check_new_path(path)?;
        let encoded = encode_entry(self.cipher.as_ref(), &self.codec, path, data)?;
        self.append(encoded)
    }

    /// Append an entry already encoded with [`Self::cipher`].
    pub fn push_encoded(&mut self, encoded: EncodedEntry) -> Result<&ManifestEntry, ContainerError> {
        self.check_new_path(&encoded.path)?;
        if encoded.iv.len() != self.scheme.iv_len() || encoded.tag.len() != self.scheme.tag_len() {
            return Err(ContainerError::Input(format!(
                "{:?} was encoded for a different scheme than {}", encoded.path, self.scheme
            )));
        }
        self.append(encoded)
    }

    fn check_new_path(&self, path: &str) -> Result<(), ContainerError> {
        validate_path(path).map_err(|reason| ContainerError::Input(format!("{path:?}: {reason}")))?;
        if self.paths.contains(path) {
            return Err(ContainerError::Input(format!("duplicate path {path:?}")));
        }
        Ok(())
    }

    fn append(&mut self, encoded: EncodedEntry) -> Result<&ManifestEntry, ContainerError> {
        let entry = encoded.to_manifest_entry(self.data_len);
        self.spool.write_all(&encoded.blob)?;
        self.data_len += encoded.blob.len() as u64;

        tracing::debug!(
            path = %entry.path,
            raw = encoded.raw_len,
            stored = entry.length,
            compressed = entry.compressed,
            "encoded entry"
        );

        self.paths.insert(entry.path.clone());
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Seal the manifest and write header, manifest and data section.
    pub fn finalize(mut self) -> Result<W, ContainerError> {
        let manifest = Manifest { files: std::mem::take(&mut self.entries) };
        let sealed = manifest.seal(self.cipher.as_ref())?;

        let header = ContainerHeader::new(
            self.scheme,
            self.salt,
            sealed.iv.clone(),
            sealed.ciphertext.len() + sealed.tag.len(),
        )?;

        header.write(&mut self.writer)?;
        self.writer.write_all(&sealed.ciphertext)?;
        self.writer.write_all(&sealed.tag)?;

        self.spool.flush()?;
        self.spool.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut (&mut self.spool).take(self.data_len), &mut self.writer)?;
        if copied != self.data_len {
            return Err(ContainerError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("data spool held {copied} of {} bytes", self.data_len),
            )));
        }
        self.writer.flush()?;

        tracing::info!(
            scheme = %self.scheme,
            files = manifest.files.len(),
            manifest_bytes = header.manifest_len,
            data_bytes = self.data_len,
            "container written"
        );
        Ok(self.writer)
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ContainerReader<R: Read + Seek> {
    reader:     R,
    header:     ContainerHeader,
    manifest:   Manifest,
    cipher:     Box<dyn AuthenticatedCipher>,
    codec:      DeflateCodec,
    data_start: u64,
}

impl<R: Read + Seek> ContainerReader<R> {
    /// Parse the header, derive the key and authenticate the manifest.
    ///
    /// Fails with [`ContainerError::Format`] for a bad magic or version
    /// (before any key derivation) and with [`ContainerError::Integrity`]
    /// if the manifest does not authenticate.
    pub fn open(mut reader: R, passphrase: &str) -> Result<Self, ContainerError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = ContainerHeader::read(&mut reader)?;

        let total_len      = reader.seek(SeekFrom::End(0))?;
        let manifest_start = header.encoded_len() as u64;
        let data_start     = manifest_start + u64::from(header.manifest_len);
        if data_start > total_len {
            return Err(ContainerError::Format(format!(
                "manifest of {} bytes runs past end of container ({total_len} bytes)",
                header.manifest_len
            )));
        }

        let key = derive_key(passphrase, &header.salt, header.scheme)?;
        let cipher = cipher_for(header.scheme, &key)?;

        let sealed = reader.read_range(manifest_start, header.manifest_len as usize)?;
        let (ciphertext, tag) = sealed.split_at(header.manifest_ciphertext_len());
        let manifest = Manifest::open(cipher.as_ref(), &header.manifest_iv, ciphertext, tag)?;
        manifest.validate(header.scheme, total_len - data_start)?;

        tracing::debug!(scheme = %header.scheme, files = manifest.files.len(), "manifest authenticated");

        Ok(Self {
            reader,
            header,
            manifest,
            cipher,
            codec: DeflateCodec::default(),
            data_start,
        })
    }

    pub fn header(&self) -> &ContainerHeader { &self.header }

    pub fn scheme(&self) -> Scheme { self.header.scheme }

    pub fn entries(&self) -> &[ManifestEntry] { &self.manifest.files }

    /// Absolute file position of the data section.
    pub fn data_start(&self) -> u64 { self.data_start }

    /// Read and decode the entry at `index` (manifest order).
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>, ContainerError> {
        let entry = self.manifest.files.get(index)
            .ok_or_else(|| ContainerError::Input(format!("no entry at index {index}")))?;
        let blob = self.reader.read_range(self.data_start + entry.offset, entry.length as usize)?;
        decode_entry(self.cipher.as_ref(), &self.codec, entry, &blob)
    }

    /// Read and decode the entry stored under `path`.
    pub fn read_path(&mut self, path: &str) -> Result<Vec<u8>, ContainerError> {
        let index = self.manifest.files.iter()
            .position(|e| e.path == path)
            .ok_or_else(|| ContainerError::Input(format!("file not found: {path}")))?;
        self.read_entry(index)
    }

    pub fn into_inner(self) -> R { self.reader }
}
