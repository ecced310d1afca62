// Startup scan: videos already sitting in the watched directory when the
// uploader starts go through the same processing path as new arrivals.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// True when the file name ends with `.{extension}`. Case-sensitive, and
/// compared on the raw name so names that are not valid UTF-8 still match.
pub fn has_video_extension(path: &Path, extension: &str) -> bool {
    let suffix = format!(".{extension}");
    path.file_name()
        .is_some_and(|n| n.as_encoded_bytes().ends_with(suffix.as_bytes()))
}

/// List the regular files directly under `dir` whose names end with the
/// video extension. Subdirectories are neither returned nor descended into.
/// The result is sorted so files are queued in a stable order.
pub fn scan_existing(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        if has_video_extension(&path, extension) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_matching_files_are_returned() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"video").unwrap();
        fs::write(dir.path().join("b.txt"), b"notes").unwrap();

        let found = scan_existing(dir.path(), "mp4").unwrap();
        assert_eq!(found, vec![dir.path().join("a.mp4")]);
    }

    #[test]
    fn subdirectories_are_skipped_even_with_video_suffix() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("folder.mp4")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.mp4"), b"video").unwrap();
        fs::write(dir.path().join("top.mp4"), b"video").unwrap();

        let found = scan_existing(dir.path(), "mp4").unwrap();
        assert_eq!(found, vec![dir.path().join("top.mp4")]);
    }

    #[test]
    fn results_are_sorted() {
        let dir = tempdir().unwrap();
        for name in ["c.mp4", "a.mp4", "b.mp4"] {
            fs::write(dir.path().join(name), b"v").unwrap();
        }
        let found = scan_existing(dir.path(), "mp4").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.mp4", "b.mp4", "c.mp4"]);
    }

    #[test]
    fn extension_match_is_case_sensitive_suffix() {
        assert!(has_video_extension(Path::new("videos/clip.mp4"), "mp4"));
        assert!(!has_video_extension(Path::new("videos/clip.MP4"), "mp4"));
        assert!(!has_video_extension(Path::new("videos/clipmp4"), "mp4"));
        assert!(!has_video_extension(Path::new("videos/clip.mp4.part"), "mp4"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_found() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"clip\xff.mp4"));
        fs::write(&path, b"video").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"notes\xff.txt")), b"x").unwrap();

        let found = scan_existing(dir.path(), "mp4").unwrap();
        assert_eq!(found, vec![path]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(scan_existing(&dir.path().join("absent"), "mp4").is_err());
    }
}
