//! High-level [`Archive`] API — the primary embedding surface.
//!
//! ```no_run
//! use oxfta::archive::{Archive, PackOptions};
//!
//! // Write
//! let mut ar = Archive::create("out.oxfta", "secret", PackOptions::default())?;
//! ar.add_file("readme.txt", b"Hello, world!")?;
//! ar.finalize()?;
//!
//! // Read
//! let mut ar = Archive::open("out.oxfta", "secret")?;
//! let data = ar.read_file("readme.txt")?;
//! assert_eq!(data, b"Hello, world!");
//! # Ok::<(), oxfta::ContainerError>(())
//! ```
//!
//! [`pack_dir`] and [`unpack_to`] wrap the whole directory-to-container
//! pipelines used by the CLI.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::crypto::Scheme;
use crate::error::ContainerError;
use crate::fsio::{list_files, output_path, SourceFile};
use crate::io_stream::{ContainerReader, ContainerWriter};
use crate::manifest::ManifestEntry;
use crate::perf::encode_files;

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`Archive::create`] and [`pack_dir`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PackOptions {
    pub scheme:   Scheme,
    /// Encode source files concurrently (needs the `parallel` feature to
    /// actually run on more than one thread).
    pub parallel: bool,
}

// ── FileInfo ──────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path:        String,
    pub offset:      u64,
    pub stored_size: u64,
    pub compressed:  bool,
}

impl From<&ManifestEntry> for FileInfo {
    fn from(e: &ManifestEntry) -> Self {
        FileInfo {
            path:        e.path.clone(),
            offset:      e.offset,
            stored_size: e.length,
            compressed:  e.compressed,
        }
    }
}

// ── ArchiveMode ───────────────────────────────────────────────────────────────

enum ArchiveMode {
    Read(ContainerReader<File>),
    Write(ContainerWriter<BufWriter<File>>, PackOptions),
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive {
    path: PathBuf,
    mode: ArchiveMode,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Open an existing container and authenticate its manifest.
    pub fn open<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_owned();
        let reader = ContainerReader::open(File::open(&path)?, passphrase)?;
        Ok(Self { path, mode: ArchiveMode::Read(reader) })
    }

    /// Create (truncate) `path` and derive a fresh archive key.
    pub fn create<P: AsRef<Path>>(path: P, passphrase: &str, opts: PackOptions) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_owned();
        let sink = BufWriter::new(File::create(&path)?);
        let writer = ContainerWriter::new(sink, passphrase, opts.scheme)?;
        Ok(Self { path, mode: ArchiveMode::Write(writer, opts) })
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<(), ContainerError> {
        match &mut self.mode {
            ArchiveMode::Write(w, _) => w.add_file(name, data).map(|_| ()),
            ArchiveMode::Read(_)     => Err(read_only()),
        }
    }

    /// Add files found by [`list_files`], in order.
    pub fn add_source_files(&mut self, files: &[SourceFile]) -> Result<(), ContainerError> {
        let (w, opts) = match &mut self.mode {
            ArchiveMode::Write(w, opts) => (w, *opts),
            ArchiveMode::Read(_)        => return Err(read_only()),
        };
        if opts.parallel {
            for encoded in encode_files(w.cipher(), w.codec(), files)? {
                w.push_encoded(encoded)?;
            }
        } else {
            for f in files {
                let data = fs::read(&f.absolute)?;
                w.add_file(&f.relative, &data)?;
            }
        }
        Ok(())
    }

    /// Write header, sealed manifest and data section.  Consumes the archive.
    pub fn finalize(self) -> Result<(), ContainerError> {
        match self.mode {
            ArchiveMode::Write(w, _) => {
                let mut sink = w.finalize()?;
                sink.flush()?;
                Ok(())
            }
            ArchiveMode::Read(_) => Err(read_only()),
        }
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    pub fn list(&self) -> Vec<FileInfo> {
        match &self.mode {
            ArchiveMode::Read(r)     => r.entries().iter().map(FileInfo::from).collect(),
            ArchiveMode::Write(w, _) => w.entries().iter().map(FileInfo::from).collect(),
        }
    }

    pub fn stat(&self, name: &str) -> Option<FileInfo> {
        self.list().into_iter().find(|f| f.path == name)
    }

    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        match &mut self.mode {
            ArchiveMode::Read(r)     => r.read_path(name),
            ArchiveMode::Write(_, _) => Err(write_only()),
        }
    }

    /// Extract every entry into `dest` in manifest order, creating parent
    /// directories on demand.  Returns the number of files written.
    ///
    /// Stops at the first failure; files written before it stay on disk.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<usize, ContainerError> {
        let dest = dest.as_ref();
        let r = match &mut self.mode {
            ArchiveMode::Read(r)     => r,
            ArchiveMode::Write(_, _) => return Err(write_only()),
        };
        fs::create_dir_all(dest)?;

        let count = r.entries().len();
        for i in 0..count {
            let data = r.read_entry(i)?;
            let out = output_path(dest, &r.entries()[i].path);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, &data)?;
            tracing::debug!(path = %r.entries()[i].path, bytes = data.len(), "extracted");
        }
        Ok(count)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn scheme(&self) -> Scheme {
        match &self.mode {
            ArchiveMode::Read(r)     => r.scheme(),
            ArchiveMode::Write(w, _) => w.scheme(),
        }
    }
}

fn read_only()  -> ContainerError { ContainerError::Input("archive is open for reading".into()) }
fn write_only() -> ContainerError { ContainerError::Input("archive is open for writing".into()) }

// ── Directory pipelines ──────────────────────────────────────────────────────

/// Result of [`pack_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub files:         usize,
    pub container_len: u64,
}

/// Pack every regular file under `source` into a new container at `output`.
///
/// The source must be an existing, non-empty directory.  If `output` lies
/// inside `source` it is skipped rather than packed into itself.
pub fn pack_dir(source: &Path, output: &Path, passphrase: &str, opts: PackOptions) -> Result<PackSummary, ContainerError> {
    if !source.is_dir() {
        return Err(ContainerError::Input(format!("source folder not found: {}", source.display())));
    }
    let root = fs::canonicalize(source)?;
    let output_abs = resolve_output(output);

    let files: Vec<SourceFile> = list_files(&root)?
        .into_iter()
        .filter(|f| Some(&f.absolute) != output_abs.as_ref())
        .collect();
    if files.is_empty() {
        return Err(ContainerError::Input(format!("no files found in {}", source.display())));
    }
    tracing::info!(files = files.len(), scheme = %opts.scheme, "packing");

    let mut ar = Archive::create(output, passphrase, opts)?;
    ar.add_source_files(&files)?;
    ar.finalize()?;

    Ok(PackSummary { files: files.len(), container_len: fs::metadata(output)?.len() })
}

/// Unpack `container` into `dest`.  Returns the number of files written.
pub fn unpack_to(container: &Path, dest: &Path, passphrase: &str) -> Result<usize, ContainerError> {
    if !container.is_file() {
        return Err(ContainerError::Input(format!("container file not found: {}", container.display())));
    }
    let mut ar = Archive::open(container, passphrase)?;
    let n = ar.extract_all(dest)?;
    tracing::info!(files = n, dest = %dest.display(), "unpacked");
    Ok(n)
}

/// Canonical location `output` will occupy, if its parent exists.
fn resolve_output(output: &Path) -> Option<PathBuf> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(parent).ok()?.join(output.file_name()?))
}
