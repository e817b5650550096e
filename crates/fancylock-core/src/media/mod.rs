//! Background media: discovery, playlist assignment and player supervision

pub mod ipc;
mod playlist;
mod scan;
mod supervisor;

use std::path::{Path, PathBuf};

pub use playlist::{assign_playlists, min_playlist_len};
pub use scan::scan_media;
pub use supervisor::{MediaProcessSupervisor, PlayerSettings};

/// Extensions played as video
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi", ".mov", ".webm", ".wmv", ".flv", ".3gp"];

/// Extensions shown as still images
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"];

/// Kind of media file, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Image,
    /// Matched a configured extension but neither table; still played
    Unknown,
}

impl MediaKind {
    /// Classify a lower-case dotted extension such as `.mkv`
    pub fn from_extension(ext: &str) -> Self {
        if VIDEO_EXTENSIONS.contains(&ext) {
            MediaKind::Video
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            MediaKind::Image
        } else {
            MediaKind::Unknown
        }
    }
}

/// A playable file found in the media directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Lower-case extension of `path` with its leading dot
pub(crate) fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}
