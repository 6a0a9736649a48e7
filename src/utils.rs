use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{InvalidPathError, WalkError};

/// Fallback for extensions with no known mapping.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Determines the MIME type of a file based on its extension.
/// Provides custom mappings for web assets and falls back to mime_guess.
/// Parameters such as `; charset=...` are never part of the result.
pub fn get_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mime = match extension.as_str() {
        "" => DEFAULT_CONTENT_TYPE,
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "html" | "htm" => "text/html",
        "json" | "map" => "application/json",
        _ => mime_guess::from_ext(&extension)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE),
    };
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Derives the object key of `path` relative to `root`.
///
/// Works on the string form of both paths: the root plus one separator is
/// stripped and every separator becomes `/`.
pub fn to_storage_key(path: &Path, root: &Path) -> Result<String, InvalidPathError> {
    let invalid = || InvalidPathError {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let path_str = path.to_string_lossy();
    let root_str = root.to_string_lossy();
    let root_str = root_str.trim_end_matches(is_separator);

    let relative = path_str
        .strip_prefix(root_str)
        .and_then(|rest| rest.strip_prefix(is_separator))
        .ok_or_else(invalid)?;

    let key = relative.replace(is_separator, "/");
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(invalid());
    }
    Ok(key.to_string())
}

fn is_separator(c: char) -> bool {
    c == MAIN_SEPARATOR || c == '/' || c == '\\'
}

/// Lists every regular file below `root`, at any depth.
///
/// Symbolic links are followed, so a link to a file is uploaded as that file;
/// a dangling link or a link cycle fails the walk. Ordering is whatever the
/// directory listing yields.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, WalkError> {
    let metadata = std::fs::metadata(root).map_err(|source| WalkError::Resolve {
        root: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(WalkError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| WalkError::Io {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_get_mime_type_custom() {
        assert_eq!(get_mime_type(Path::new("file.woff2")), "font/woff2");
        assert_eq!(get_mime_type(Path::new("file.css")), "text/css");
        assert_eq!(
            get_mime_type(Path::new("file.js")),
            "application/javascript"
        );
        assert_eq!(get_mime_type(Path::new("INDEX.HTML")), "text/html");
    }

    #[test]
    fn test_get_mime_type_fallback() {
        assert_eq!(get_mime_type(Path::new("a.txt")), "text/plain");
        assert_eq!(get_mime_type(Path::new("b/c.json")), "application/json");
        assert_eq!(get_mime_type(Path::new("logo.png")), "image/png");
    }

    #[test]
    fn test_get_mime_type_unknown() {
        assert_eq!(
            get_mime_type(Path::new("file.unknown")),
            DEFAULT_CONTENT_TYPE
        );
        assert_eq!(get_mime_type(Path::new("LICENSE")), DEFAULT_CONTENT_TYPE);
        assert_eq!(get_mime_type(Path::new(".hidden")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_get_mime_type_has_no_parameters() {
        for name in ["a.txt", "a.html", "a.css", "a.csv", "a.xml", "a.svg"] {
            let mime = get_mime_type(Path::new(name));
            assert!(!mime.contains(';'), "{name} -> {mime}");
            assert_eq!(mime, get_mime_type(Path::new(name)));
        }
    }

    #[test]
    fn test_to_storage_key_strips_root() {
        let root = Path::new("/srv/dist");
        assert_eq!(
            to_storage_key(&root.join("a.txt"), root).unwrap(),
            "a.txt"
        );
        assert_eq!(
            to_storage_key(&root.join("b").join("c.json"), root).unwrap(),
            "b/c.json"
        );
    }

    #[test]
    fn test_to_storage_key_accepts_trailing_separator_on_root() {
        assert_eq!(
            to_storage_key(Path::new("dist/img/logo.png"), Path::new("dist/")).unwrap(),
            "img/logo.png"
        );
    }

    #[test]
    fn test_to_storage_key_normalizes_backslashes() {
        let key = to_storage_key(Path::new("dist\\b\\c.json"), Path::new("dist")).unwrap();
        assert_eq!(key, "b/c.json");
        assert!(!key.contains('\\'));
        assert!(!key.starts_with('/'));
    }

    #[test]
    fn test_to_storage_key_rejects_paths_outside_root() {
        assert!(to_storage_key(Path::new("/srv/other/a.txt"), Path::new("/srv/dist")).is_err());
        // Shares the string prefix but is a sibling directory.
        assert!(to_storage_key(Path::new("/srv/dist2/a.txt"), Path::new("/srv/dist")).is_err());
        assert!(to_storage_key(Path::new("/srv/dist"), Path::new("/srv/dist")).is_err());
    }

    #[test]
    fn test_walk_files_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir_all(dir.path().join("b/deeper/still")).unwrap();
        fs::write(dir.path().join("b/c.json"), b"{}").unwrap();
        fs::write(dir.path().join("b/deeper/still/d.bin"), b"d").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let mut files = walk_files(dir.path()).unwrap();
        files.sort();

        let mut expected = vec![
            dir.path().join("a.txt"),
            dir.path().join("b/c.json"),
            dir.path().join("b/deeper/still/d.bin"),
        ];
        expected.sort();
        assert_eq!(files, expected);
        assert!(files.iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_walk_files_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_files_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, WalkError::Resolve { .. }));
    }

    #[test]
    fn test_walk_files_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"a").unwrap();
        assert!(matches!(
            walk_files(&file).unwrap_err(),
            WalkError::NotADirectory(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_files_follows_file_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("shared.css"), b"body{}").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("shared.css"),
            dir.path().join("linked.css"),
        )
        .unwrap();

        let files = walk_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("linked.css")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_files_fails_on_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.txt"), dir.path().join("broken.txt"))
            .unwrap();

        assert!(matches!(
            walk_files(dir.path()).unwrap_err(),
            WalkError::Io { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_files_fails_on_symlink_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        assert!(matches!(
            walk_files(dir.path()).unwrap_err(),
            WalkError::Io { .. }
        ));
    }
}
