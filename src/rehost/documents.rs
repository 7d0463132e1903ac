//! Document discovery

use crate::RehostError;
use std::path::{Path, PathBuf};

/// Recursively lists files under `root` with the given extension
///
/// Hidden directories (names starting with `.`) are skipped. The extension
/// is matched case-insensitively and may be given with or without its dot.
/// Results are sorted so runs are reproducible.
///
/// # Errors
///
/// Returns [`RehostError::NotFound`] if `root` does not exist, or
/// [`RehostError::Filesystem`] if a directory cannot be read.
pub fn find_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>, RehostError> {
    if !root.exists() {
        return Err(RehostError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let extension = extension.trim_start_matches('.');
    let mut documents = Vec::new();

    if root.is_file() {
        if has_extension(root, extension) {
            documents.push(root.to_path_buf());
        }
        return Ok(documents);
    }

    walk(root, extension, &mut documents)?;
    documents.sort();
    Ok(documents)
}

fn walk(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<(), RehostError> {
    let fs_error = |source| RehostError::Filesystem {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(fs_error)? {
        let entry = entry.map_err(fs_error)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(fs_error)?;

        if file_type.is_dir() {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden {
                walk(&path, extension, out)?;
            }
        } else if file_type.is_file() && has_extension(&path, extension) {
            out.push(path);
        }
    }

    Ok(())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finds_nested_documents_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("notes/deep")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.MD"), "a").unwrap();
        std::fs::write(dir.path().join("notes/deep/c.md"), "c").unwrap();
        std::fs::write(dir.path().join("notes/skip.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".git/hidden.md"), "h").unwrap();

        let docs = find_documents(dir.path(), ".md").unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.MD"),
                PathBuf::from("b.md"),
                PathBuf::from("notes/deep/c.md"),
            ]
        );
    }

    #[test]
    fn test_single_file_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("only.md");
        std::fs::write(&file, "x").unwrap();

        assert_eq!(find_documents(&file, "md").unwrap(), vec![file]);
    }

    #[test]
    fn test_missing_root() {
        let result = find_documents(Path::new("/nonexistent/docs"), "md");
        assert!(matches!(result, Err(RehostError::NotFound { .. })));
    }
}
