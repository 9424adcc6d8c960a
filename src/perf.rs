//! Parallel per-file encoding.
//!
//! Reading, compressing and encrypting one file is independent of every
//! other file: the only shared inputs are the read-only cipher and codec.
//! [`encode_files`] fans that work out over Rayon and returns the results in
//! input order.  Offsets are *not* assigned here; the caller feeds the
//! results to [`ContainerWriter::push_encoded`] in order, whose running
//! accumulator performs the prefix sum.
//!
//! Without the `parallel` feature the same function runs sequentially.
//! Either way every encoded blob is held in memory until it is pushed, so
//! parallel packing trades peak memory for throughput.
//!
//! [`ContainerWriter::push_encoded`]: crate::io_stream::ContainerWriter::push_encoded

use std::fs;

use crate::codec::Codec;
use crate::crypto::AuthenticatedCipher;
use crate::entry::{encode_entry, EncodedEntry};
use crate::error::ContainerError;
use crate::fsio::SourceFile;

/// Read and encode every file, preserving input order.
///
/// The first error wins; remaining work is abandoned.
pub fn encode_files(
    cipher: &dyn AuthenticatedCipher,
    codec:  &dyn Codec,
    files:  &[SourceFile],
) -> Result<Vec<EncodedEntry>, ContainerError> {
    let encode_one = |f: &SourceFile| -> Result<EncodedEntry, ContainerError> {
        let raw = fs::read(&f.absolute)?;
        Ok(encode_entry(cipher, codec, &f.relative, &raw)?)
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        files.par_iter().map(encode_one).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        files.iter().map(encode_one).collect()
    }
}
