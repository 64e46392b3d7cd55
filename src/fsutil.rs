//! Filesystem helpers shared by the tools
//!
//! Output files are never written in place: content goes to a hidden
//! `.{name}.partial` sibling first and is renamed over the target, so an
//! interrupted run leaves either the old file or the new one.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{DataCollectError, Result};

const COMPARE_CHUNK: usize = 64 * 1024;

/// Hidden sibling used while writing `target`
pub fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial", name))
}

/// Byte-for-byte comparison of two files
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let meta_a = fs::metadata(a).map_err(|e| DataCollectError::io(a, e))?;
    let meta_b = fs::metadata(b).map_err(|e| DataCollectError::io(b, e))?;
    if !meta_a.is_file() || !meta_b.is_file() || meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a).map_err(|e| DataCollectError::io(a, e))?);
    let mut reader_b = BufReader::new(File::open(b).map_err(|e| DataCollectError::io(b, e))?);
    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];

    loop {
        let n = read_full(&mut reader_a, &mut buf_a).map_err(|e| DataCollectError::io(a, e))?;
        let m = read_full(&mut reader_b, &mut buf_b).map_err(|e| DataCollectError::io(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Copy `source` to `target` through a partial sibling, then verify it
pub fn copy_verified(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| DataCollectError::io(parent, e))?;
    }
    let partial = partial_path(target);
    if let Err(e) = fs::copy(source, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(DataCollectError::io(&partial, e));
    }
    if let Err(e) = fs::rename(&partial, target) {
        let _ = fs::remove_file(&partial);
        return Err(DataCollectError::io(target, e));
    }

    if !files_identical(source, target)? {
        return Err(DataCollectError::io(
            target,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "copy does not match its source",
            ),
        ));
    }
    Ok(())
}

/// Write `contents` to `path` unless it already holds exactly that.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents {
            return Ok(false);
        }
    }
    write_atomic(path, contents)?;
    Ok(true)
}

/// Write `contents` to `path` through a partial sibling
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DataCollectError::io(parent, e))?;
    }
    let partial = partial_path(path);
    {
        let mut file = File::create(&partial).map_err(|e| DataCollectError::io(&partial, e))?;
        file.write_all(contents)
            .and_then(|_| file.sync_all())
            .map_err(|e| DataCollectError::io(&partial, e))?;
    }
    fs::rename(&partial, path).map_err(|e| {
        let _ = fs::remove_file(&partial);
        DataCollectError::io(path, e)
    })
}

/// Check that files can be created in `dir`, creating it if needed
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DataCollectError::io(dir, e))?;
    let probe = dir.join(".datacollect-write-test");
    File::create(&probe).map_err(|e| DataCollectError::io(&probe, e))?;
    fs::remove_file(&probe).map_err(|e| DataCollectError::io(&probe, e))?;
    Ok(())
}

/// Canonical form of a path that may not exist yet.
///
/// The nearest existing ancestor is canonicalized and the missing tail is
/// appended with `.` and `..` resolved lexically.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| DataCollectError::io(path, e))?;
    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(e) => {
                let (Some(parent), Some(last)) = (existing.parent(), existing.components().next_back())
                else {
                    return Err(DataCollectError::io(path, e));
                };
                missing.push(last.as_os_str().to_os_string());
                existing = parent;
            }
        }
    };
    for name in missing.iter().rev() {
        match Path::new(name).components().next() {
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::CurDir) | None => {}
            _ => resolved.push(name),
        }
    }
    Ok(resolved)
}

/// Whether `value` can be joined onto a path as exactly one directory
pub fn is_plain_name(value: &str) -> bool {
    !value.is_empty() && !value.contains(['/', '\\']) && value != "." && value != ".."
}

/// `path` relative to `base`, with `/` separators
pub fn display_relative(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
