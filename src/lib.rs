pub mod crypto;
pub mod codec;
pub mod entry;
pub mod manifest;
pub mod header;
pub mod io_stream;
pub mod fsio;
pub mod perf;
pub mod archive;
pub mod error;

pub use archive::{pack_dir, unpack_to, Archive, PackOptions};
pub use crypto::{AuthenticatedCipher, Scheme};
pub use error::ContainerError;
pub use header::ContainerHeader;
pub use io_stream::{ContainerReader, ContainerWriter};
pub use manifest::{Manifest, ManifestEntry};
