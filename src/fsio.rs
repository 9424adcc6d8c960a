//! Filesystem collaborators: recursive file listing and byte-range reads.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

/// A regular file found under a source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub relative: String,
}

/// Recursively list regular files under `root`, depth-first, with each
/// directory's entries sorted by name.  Directories are not listed; they
/// are implied by file paths.  Symlinks are not followed.
pub fn list_files(root: &Path) -> io::Result<Vec<SourceFile>> {
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            walk(root, &path, out)?;
        } else if ft.is_file() {
            let relative = relative_key(root, &path)?;
            out.push(SourceFile { absolute: path, relative });
        }
    }
    Ok(())
}

/// `path` relative to `root` as a portable `/`-joined string.
fn relative_key(root: &Path, path: &Path) -> io::Result<String> {
    let rel = path.strip_prefix(root)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut parts = Vec::new();
    for c in rel.components() {
        match c {
            Component::Normal(s) => parts.push(s.to_str().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("non UTF-8 file name under {}", root.display()))
            })?),
            _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("unexpected path component in {}", rel.display()))),
        }
    }
    Ok(parts.join("/"))
}

/// Map a manifest path (`/`-separated, already validated) under `dest`.
pub fn output_path(dest: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .fold(dest.to_path_buf(), |p, s| p.join(s))
}

/// Exact-length reads at absolute positions.
pub trait RangeReader {
    /// Read exactly `len` bytes starting at `offset`.  A short read is an
    /// [`io::ErrorKind::UnexpectedEof`] error.
    fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>>;
}

impl<R: Read + Seek> RangeReader for R {
    fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn lists_files_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("b.bin"), b"b").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/c.txt"), b"c").unwrap();
        fs::write(root.join("sub/deeper/d.json"), b"d").unwrap();

        let files = list_files(root).unwrap();
        let rel: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rel, ["a.txt", "b.bin", "sub/c.txt", "sub/deeper/d.json"]);
        assert_eq!(files[2].absolute, root.join("sub").join("c.txt"));
    }

    #[test]
    fn output_path_joins_components() {
        let p = output_path(Path::new("/out"), "sub/deeper/d.json");
        assert_eq!(p, Path::new("/out").join("sub").join("deeper").join("d.json"));
    }

    #[test]
    fn read_range_is_exact() {
        let mut c = Cursor::new(b"0123456789".to_vec());
        assert_eq!(c.read_range(3, 4).unwrap(), b"3456");
        assert_eq!(c.read_range(0, 0).unwrap(), b"");
        assert_eq!(c.read_range(8, 4).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
