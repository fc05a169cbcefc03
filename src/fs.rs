//! Capability-scoped file helpers.
//!
//! Paths are split into a parent directory opened with ambient authority and
//! a file name resolved inside it, so every read and write goes through a
//! `cap-std` directory handle.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

fn split(path: &Utf8Path) -> io::Result<(&Utf8Path, &str)> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path has no file name: {path}"),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Ok((parent, file_name))
}

/// Reads a UTF-8 file into a string.
pub(crate) fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (parent, file_name) = split(path)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}

/// Writes `contents` to `path`, creating missing parent directories.
pub(crate) fn write(path: &Utf8Path, contents: &str) -> io::Result<()> {
    let (parent, file_name) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority())?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.write(file_name, contents)
}
