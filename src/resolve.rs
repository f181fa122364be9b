//! Maps request paths onto files below the served root.
//!
//! Nothing outside the root is ever returned: `..` segments are resolved
//! lexically first, then the surviving path is canonicalized so that
//! symlinks pointing out of the root are caught as well.

use std::path::{Path, PathBuf};

use crate::error::ServeError;

/// A request path that passed the sandbox check and names an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute path.
    pub absolute: PathBuf,
    /// The same file relative to the root, for log lines.
    pub relative: PathBuf,
}

/// Resolves the path part of a request target (no query) against `root`,
/// which must already be canonical.
pub fn resolve(raw_path: &str, root: &Path) -> Result<ResolvedPath, ServeError> {
    let decoded = percent_decode(raw_path);
    if decoded.contains(&0) {
        return Err(ServeError::InvalidUri);
    }
    let decoded = String::from_utf8_lossy(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ServeError::PathEscape {
                        path: root.join(decoded.trim_start_matches('/')),
                    });
                }
            }
            segment => segments.push(segment),
        }
    }

    let full_path = segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    // anything that can't be canonicalized does not exist as far as the
    // client is concerned
    let Ok(canonical) = full_path.canonicalize() else {
        return Err(ServeError::NotFound { path: full_path });
    };

    let Ok(relative) = canonical.strip_prefix(root).map(Path::to_path_buf) else {
        return Err(ServeError::PathEscape { path: canonical });
    };

    if canonical.is_dir() {
        return Err(ServeError::NotFound { path: canonical });
    }

    Ok(ResolvedPath {
        absolute: canonical,
        relative,
    })
}

/// Decodes `%XX` escapes. Malformed escapes are kept as they are.
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let high = bytes.get(i + 1).and_then(|b| hex_value(*b));
            let low = bytes.get(i + 2).and_then(|b| hex_value(*b));
            if let (Some(high), Some(low)) = (high, low) {
                decoded.push((high << 4) | low);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    decoded
}

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte)
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
}
