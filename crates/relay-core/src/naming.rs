//! Sanitized, position-prefixed on-disk names under the download root.

use std::path::{Path, PathBuf};

use crate::normalize::{FileKind, ResolvedUrl};

/// Concrete fetchable URL plus the allocated local path for one transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: String,
    pub local_filename: String,
    pub local_path: PathBuf,
    pub kind: FileKind,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str, position: usize) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.chars().all(|c| c == '.') {
        format!("file_{position}")
    } else {
        out
    }
}

/// `<NNN>_<sanitized>`; the prefix keeps colliding basenames apart within a batch.
pub fn allocate_filename(position: usize, basename: &str) -> String {
    format!("{position:03}_{}", sanitize_filename(basename, position))
}

pub fn allocate_target(root: &Path, resolved: &ResolvedUrl, position: usize) -> ResolvedTarget {
    let local_filename = allocate_filename(position, &resolved.basename);
    ResolvedTarget {
        url: resolved.url.clone(),
        local_path: root.join(&local_filename),
        local_filename,
        kind: resolved.kind,
    }
}
