use crate::bagit::consts::*;
use crate::bagit::error::*;
use snafu::ResultExt;
use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Joins a bag-relative path to the bag's base directory. Paths already prefixed by the
/// base directory are returned unchanged. The result uses OS-native separators.
pub fn make_absolute<P: AsRef<Path>>(base_dir: P, rel: &str) -> PathBuf {
    let base_dir = base_dir.as_ref();
    let rel_path = Path::new(rel);

    if rel_path.starts_with(base_dir) {
        rel_path.to_path_buf()
    } else {
        base_dir.join(rel)
    }
}

/// Lexically resolves `.` and `..` and returns the bag-relative portion of the path in
/// forward-slash form. Returns an empty string if the path does not lie under the base
/// directory.
pub fn make_relative<P: AsRef<Path>>(base_dir: P, path: &Path) -> String {
    let base = match lexical_resolve(base_dir.as_ref()) {
        Some(base) => base,
        None => return String::new(),
    };
    let resolved = match lexical_resolve(path) {
        Some(resolved) => resolved,
        None => return String::new(),
    };

    match resolved.strip_prefix(&base) {
        Ok(rel) => to_forward_slash(rel),
        Err(_) => String::new(),
    }
}

/// True if the bag-relative path points into the payload directory
pub fn in_payload(rel: &str) -> bool {
    rel.starts_with(DATA_PREFIX)
}

/// Resolves `.` and `..` components without touching the filesystem. Returns `None` when
/// `..` would climb out of the path's root.
pub fn lexical_resolve(path: &Path) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    let mut depth: usize = 0;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::Normal(c) => {
                resolved.push(c);
                depth += 1;
            }
            c => resolved.push(c),
        }
    }

    Some(resolved)
}

/// True if the final segment of the path, uppercased, is a Windows device name
pub fn is_reserved_name(rel: &str) -> bool {
    match rel.rsplit('/').next() {
        Some(name) => {
            let name = name.to_uppercase();
            RESERVED_NAMES.iter().any(|reserved| *reserved == name)
        }
        None => false,
    }
}

/// True if the path contains characters that cannot be stored on Windows. These are legal
/// in BagIt and only warrant a warning.
pub fn has_illegal_chars(rel: &str) -> bool {
    rel.contains(|c: char| ILLEGAL_CHARS.contains(&c))
}

/// Converts OS-native separators to the internal forward-slash form
pub fn to_forward_slash(path: &Path) -> String {
    let mut joined = String::new();
    for component in path.components() {
        if !joined.is_empty() {
            joined.push('/');
        }
        joined.push_str(&component.as_os_str().to_string_lossy());
    }
    joined
}

/// Removes directories along the bag-relative path that became empty, walking up to but
/// never past the payload directory
pub fn prune_empty_parents(base_dir: &Path, rel: &str) -> Result<()> {
    let mut current = Path::new(rel).parent();

    while let Some(parent) = current {
        let rel_str = to_forward_slash(parent);
        if rel_str.is_empty() || rel_str == DATA {
            break;
        }

        let abs = base_dir.join(parent);
        if abs.exists() {
            let mut entries = fs::read_dir(&abs).context(IoReadDirSnafu { path: &abs })?;
            if entries.next().is_some() {
                break;
            }
            fs::remove_dir(&abs).context(IoDeleteSnafu { path: &abs })?;
        }

        current = parent.parent();
    }

    Ok(())
}

#[cfg(target_os = "windows")]
pub fn convert_path_separator(path: &str) -> Cow<str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        path.into()
    }
}

#[cfg(not(target_os = "windows"))]
pub fn convert_path_separator(path: &str) -> Cow<str> {
    path.into()
}

#[cfg(test)]
mod tests {
    use crate::bagit::paths::*;
    use std::path::Path;

    #[test]
    fn relative_paths_resolve_under_the_base() {
        let base = Path::new("/bags/example");

        assert_eq!(
            "data/sub/file.txt",
            make_relative(base, Path::new("/bags/example/data/sub/file.txt"))
        );
        assert_eq!(
            "data/file.txt",
            make_relative(base, Path::new("/bags/example/data/sub/../file.txt"))
        );
        assert_eq!("", make_relative(base, Path::new("/bags/other/file.txt")));
        assert_eq!(
            "",
            make_relative(base, Path::new("/bags/example/data/../../escape.txt"))
        );
    }

    #[test]
    fn absolute_paths_are_not_rejoined() {
        let base = Path::new("/bags/example");

        assert_eq!(
            Path::new("/bags/example/data/a.txt"),
            make_absolute(base, "/bags/example/data/a.txt")
        );
        assert_eq!(
            Path::new("/bags/example/data/a.txt"),
            make_absolute(base, "data/a.txt")
        );
    }

    #[test]
    fn payload_membership() {
        assert!(in_payload("data/file.txt"));
        assert!(!in_payload("bagit.txt"));
        assert!(!in_payload("database/file.txt"));
    }

    #[test]
    fn reserved_names_match_final_segment() {
        assert!(is_reserved_name("CON"));
        assert!(is_reserved_name("data/sub/lpt1"));
        assert!(is_reserved_name("data/Com9"));
        assert!(!is_reserved_name("data/CONSOLE"));
        assert!(!is_reserved_name("data/con.txt"));
    }

    #[test]
    fn illegal_character_detection() {
        assert!(has_illegal_chars("data/a<b.txt"));
        assert!(has_illegal_chars("data/time 12:30.txt"));
        assert!(!has_illegal_chars("data/plain.txt"));
    }
}
