//! Crate-wide error taxonomy.
//!
//! Module errors ([`CryptoError`], [`CodecError`], [`HeaderError`],
//! [`ManifestError`]) fold into [`ContainerError`].  Every authentication
//! failure becomes [`ContainerError::Integrity`], whose message is the same
//! for a wrong passphrase and for tampered data.

use std::io;

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::header::HeaderError;
use crate::manifest::ManifestError;

/// Process exit codes used by the CLI.  `2` is reserved for usage errors,
/// which `clap` reports itself.
pub mod exit_code {
    pub const FAILURE:   i32 = 1;
    pub const USAGE:     i32 = 2;
    pub const INPUT:     i32 = 3;
    pub const FORMAT:    i32 = 4;
    pub const INTEGRITY: i32 = 5;
    pub const IO:        i32 = 6;
}

#[derive(Error, Debug)]
pub enum ContainerError {
    /// Source folder or container file missing, wrong type, or empty.
    #[error("Input error: {0}")]
    Input(String),
    /// Bad magic, unsupported version, or malformed structure.
    #[error("Format error: {0}")]
    Format(String),
    #[error("Integrity check failed: wrong passphrase or corrupted data")]
    Integrity,
    /// Non-authentication crypto failure (key setup, encryption).
    #[error(transparent)]
    Crypto(CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ContainerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ContainerError::Input(_)  => exit_code::INPUT,
            ContainerError::Format(_) => exit_code::FORMAT,
            ContainerError::Integrity => exit_code::INTEGRITY,
            ContainerError::Crypto(_) => exit_code::FAILURE,
            ContainerError::Io(_)     => exit_code::IO,
        }
    }
}

impl From<CryptoError> for ContainerError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed => ContainerError::Integrity,
            other => ContainerError::Crypto(other),
        }
    }
}

impl From<CodecError> for ContainerError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => ContainerError::Io(io),
            other => ContainerError::Format(other.to_string()),
        }
    }
}

impl From<HeaderError> for ContainerError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::Io(io) if io.kind() != io::ErrorKind::UnexpectedEof => ContainerError::Io(io),
            other => ContainerError::Format(other.to_string()),
        }
    }
}

impl From<ManifestError> for ContainerError {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::Crypto(c) => c.into(),
            other => ContainerError::Format(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_collapse_to_integrity() {
        let e: ContainerError = CryptoError::AuthenticationFailed.into();
        assert!(matches!(e, ContainerError::Integrity));
        let e: ContainerError = ManifestError::Crypto(CryptoError::AuthenticationFailed).into();
        assert!(matches!(e, ContainerError::Integrity));
        assert_eq!(e.exit_code(), exit_code::INTEGRITY);
    }

    #[test]
    fn truncated_header_is_a_format_error() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let e: ContainerError = HeaderError::Io(eof).into();
        assert!(matches!(e, ContainerError::Format(_)));
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let e: ContainerError = HeaderError::Io(denied).into();
        assert!(matches!(e, ContainerError::Io(_)));
    }

    #[test]
    fn integrity_message_does_not_say_which_cause() {
        let msg = ContainerError::Integrity.to_string();
        assert!(msg.contains("wrong passphrase or corrupted data"));
    }
}
