//! Module specifier resolution.
//!
//! Turns a user-authored specifier into a concrete file path. The base
//! directory for relative specifiers is passed explicitly on every call —
//! relative config paths resolve against the tool's install location, not
//! the invoking shell's CWD, so user configuration stays portable.

use std::path::{Path, PathBuf};

use tracing::debug;

use archmap_shared::{ArchmapError, Result};

/// Resolve a module specifier to an existing file.
///
/// Probe order:
/// 1. the expanded specifier itself, if it names an existing file;
/// 2. the specifier with each candidate extension appended, in the
///    caller-supplied preference order;
/// 3. if the specifier names an existing directory, an `index` file with
///    each candidate extension inside it.
///
/// Specifier normalization: a leading `~` expands to the user's home
/// directory, absolute paths are used as-is, and anything else resolves
/// against `base_dir`.
pub fn resolve_module(specifier: &str, base_dir: &Path, extensions: &[&str]) -> Result<PathBuf> {
    let expanded = expand_specifier(specifier, base_dir);
    let mut tried = 0usize;

    tried += 1;
    if expanded.is_file() {
        debug!(specifier, path = %expanded.display(), "module resolved exactly");
        return Ok(expanded);
    }

    for ext in extensions {
        let candidate = append_extension(&expanded, ext);
        tried += 1;
        if candidate.is_file() {
            debug!(specifier, path = %candidate.display(), "module resolved by extension");
            return Ok(candidate);
        }
    }

    if expanded.is_dir() {
        for ext in extensions {
            let candidate = append_extension(&expanded.join("index"), ext);
            tried += 1;
            if candidate.is_file() {
                debug!(specifier, path = %candidate.display(), "module resolved to directory index");
                return Ok(candidate);
            }
        }
    }

    Err(ArchmapError::ModuleNotFound {
        specifier: specifier.to_string(),
        base: base_dir.to_path_buf(),
        tried,
    })
}

/// Apply `~`/absolute/relative normalization.
fn expand_specifier(specifier: &str, base_dir: &Path) -> PathBuf {
    if let Some(rest) = specifier.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if specifier == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    let path = Path::new(specifier);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Append an extension string without replacing an existing one:
/// `foo.plugin` + `.toml` → `foo.plugin.toml`.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}
