//! Depth-first walk behind [`scan`](super::scan)

use std::fs::{self, FileType, ReadDir};
use std::io;
use std::path::Path;

enum EntryKind {
    Directory,
    File,
}

/// Walk every entry of `dir`, descending into subdirectories before
/// moving on to the next entry.
///
/// Hidden directories are never entered and directories that cannot be
/// opened are skipped. An enumeration error ends this directory's loop but
/// not the parent's. `dir` is dropped, and its handle released, on every
/// return path. Subdirectories are opened through `open_dir`.
pub(super) fn walk_dir<F, O>(dir: ReadDir, extension: &str, on_match: &mut F, open_dir: &O)
where
    F: FnMut(&Path, &str) + ?Sized,
    O: Fn(&Path) -> io::Result<ReadDir>,
{
    for entry in dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Directory enumeration stopped");
                break;
            }
        };

        let path = entry.path();
        let kind = match entry.file_type() {
            Ok(file_type) => classify(&path, file_type),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                None
            }
        };
        let Some(kind) = kind else {
            continue;
        };

        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        match kind {
            EntryKind::Directory => {
                if name.starts_with('.') {
                    continue;
                }
                match open_dir(&path) {
                    Ok(sub_dir) => walk_dir(sub_dir, extension, on_match, open_dir),
                    Err(e) => {
                        tracing::debug!(dir = %path.display(), error = %e, "Skipping unopenable directory");
                    }
                }
            }
            EntryKind::File => {
                if file_extension(&name) == extension {
                    on_match(&path, &name);
                }
            }
        }
    }
}

/// Symlinks are followed for files only; a link to a directory is skipped
/// so a cyclic link cannot recurse forever.
fn classify(path: &Path, file_type: FileType) -> Option<EntryKind> {
    if file_type.is_dir() {
        return Some(EntryKind::Directory);
    }
    if !file_type.is_symlink() {
        return Some(EntryKind::File);
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            tracing::debug!(path = %path.display(), "Not following directory symlink");
            None
        }
        Ok(_) => Some(EntryKind::File),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Skipping dangling symlink");
            None
        }
    }
}

/// Text after the last `.` of `name`, or `""` when there is none.
pub(crate) fn file_extension(name: &str) -> &str {
    name.rfind('.').map_or("", |dot| &name[dot + 1..])
}
