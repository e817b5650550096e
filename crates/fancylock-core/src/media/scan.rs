//! Recursive media directory scan

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, Span};

use super::{dotted_extension, MediaFile, MediaKind};
use crate::error::MediaError;

/// Walk `dir` recursively and collect files whose extension is in
/// `extensions`. Images are skipped unless `include_images` is set.
///
/// Fails only if `dir` itself cannot be read; unreadable subdirectories are
/// skipped. Symlinked directories are not followed. The result is sorted by
/// path.
pub fn scan_media(
    dir: &Path,
    extensions: &[String],
    include_images: bool,
    span: &Span,
) -> Result<Vec<MediaFile>, MediaError> {
    let extensions: Vec<String> = extensions.iter().map(|e| e.to_ascii_lowercase()).collect();

    let root = fs::read_dir(dir).map_err(|source| MediaError::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    let mut pending: Vec<PathBuf> = Vec::new();
    visit(root, &extensions, include_images, &mut found, &mut pending);

    while let Some(next) = pending.pop() {
        match fs::read_dir(&next) {
            Ok(entries) => visit(entries, &extensions, include_images, &mut found, &mut pending),
            Err(e) => debug!(parent: span, "Skipping unreadable directory {:?}: {}", next, e),
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(parent: span, "Found {} media files in {:?}", found.len(), dir);
    Ok(found)
}

fn visit(
    entries: fs::ReadDir,
    extensions: &[String],
    include_images: bool,
    found: &mut Vec<MediaFile>,
    pending: &mut Vec<PathBuf>,
) {
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            pending.push(path);
            continue;
        }

        // Symlinks count only when they resolve to a regular file
        let is_file = file_type.is_file()
            || (file_type.is_symlink() && fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false));
        if !is_file {
            continue;
        }

        let ext = match dotted_extension(&path) {
            Some(ext) => ext,
            None => continue,
        };
        if !extensions.contains(&ext) {
            continue;
        }

        let kind = MediaKind::from_extension(&ext);
        if kind == MediaKind::Image && !include_images {
            continue;
        }

        found.push(MediaFile::new(path, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log;
    use tempfile::TempDir;
    use tracing::info_span;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_recursive_scan_filters_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mp4"));
        touch(&dir.path().join("nested/deeper/b.MKV"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.avi"));

        let found = scan_media(dir.path(), &exts(&[".mp4", ".mkv"]), true, &Span::none()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(found.len(), 2);
        assert!(names.contains(&"a.mp4".to_string()));
        assert!(names.contains(&"b.MKV".to_string()));
        assert!(found.iter().all(|f| f.kind == MediaKind::Video));
    }

    #[test]
    fn test_images_respect_toggle() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("photo.jpg"));
        touch(&dir.path().join("clip.webm"));
        let extensions = exts(&[".jpg", ".webm"]);

        assert_eq!(scan_media(dir.path(), &extensions, true, &Span::none()).unwrap().len(), 2);

        let without = scan_media(dir.path(), &extensions, false, &Span::none()).unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].kind, MediaKind::Video);
    }

    #[test]
    fn test_unknown_kind_still_collected() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("stream.ts"));

        let found = scan_media(dir.path(), &exts(&[".ts"]), false, &Span::none()).unwrap();
        assert_eq!(found, vec![MediaFile::new(dir.path().join("stream.ts"), MediaKind::Unknown)]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(scan_media(dir.path(), &exts(&[".mp4"]), true, &Span::none()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_logs_under_caller_span() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mp4"));
        let (captured, _guard) = test_log::capture();

        let span = info_span!("rescan");
        scan_media(dir.path(), &exts(&[".mp4"]), true, &span).unwrap();

        let logs = captured.text();
        let line = logs.lines().find(|line| line.contains("Found 1 media files"));
        assert!(line.is_some_and(|line| line.contains("rescan")), "{}", logs);
    }

    #[test]
    fn test_missing_directory_is_scan_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            scan_media(&missing, &exts(&[".mp4"]), true, &Span::none()),
            Err(MediaError::Scan { .. })
        ));
    }
}
