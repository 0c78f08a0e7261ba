//! Content directory layout and media lookup.
//!
//! Everything the service produces lives under one root:
//! `images/`, `videos/` and `edited/`. Files are never overwritten; every
//! artifact name carries a microsecond timestamp.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "gif", "webm"];

const MAX_UPLOAD_NAME: usize = 100;

/// Timestamp used in artifact file names, unique at microsecond precision.
pub fn artifact_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// Fresh artifact file name `<prefix>_<timestamp>.<ext>`.
pub fn stamped_name(prefix: &str, ext: &str) -> String {
    format!("{}_{}.{}", prefix, artifact_stamp(), ext)
}

/// Remove a file left behind by a failed attempt.
pub async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`, dropping any
/// directory part and leading dots.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// The three artifact directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Images,
    Videos,
    Edited,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Images, MediaKind::Videos, MediaKind::Edited];

    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::Images => "images",
            MediaKind::Videos => "videos",
            MediaKind::Edited => "edited",
        }
    }

    /// Directory an upload with extension `ext` belongs in, if any.
    pub fn for_extension(ext: &str) -> Option<MediaKind> {
        let ext = ext.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Images)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Videos)
        } else {
            None
        }
    }

    fn accepts(self, path: &Path) -> bool {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match self {
            MediaKind::Images => IMAGE_EXTENSIONS.contains(&ext.as_str()),
            MediaKind::Videos => VIDEO_EXTENSIONS.contains(&ext.as_str()),
            MediaKind::Edited => true,
        }
    }
}

/// `type` filter of a media listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaFilter {
    #[default]
    All,
    Only(MediaKind),
}

impl MediaFilter {
    fn includes(self, kind: MediaKind) -> bool {
        match self {
            MediaFilter::All => true,
            MediaFilter::Only(only) => only == kind,
        }
    }
}

impl FromStr for MediaFilter {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(MediaFilter::All),
            "images" => Ok(MediaFilter::Only(MediaKind::Images)),
            "videos" => Ok(MediaFilter::Only(MediaKind::Videos)),
            "edited" => Ok(MediaFilter::Only(MediaKind::Edited)),
            other => Err(StorageError::UnknownMediaType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    pub file_name: String,
    /// Path relative to the content root, with `/` separators.
    pub path: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaListing {
    pub images: Vec<MediaEntry>,
    pub videos: Vec<MediaEntry>,
    pub edited: Vec<MediaEntry>,
}

impl MediaListing {
    pub fn count(&self) -> usize {
        self.images.len() + self.videos.len() + self.edited.len()
    }

    fn slot(&mut self, kind: MediaKind) -> &mut Vec<MediaEntry> {
        match kind {
            MediaKind::Images => &mut self.images,
            MediaKind::Videos => &mut self.videos,
            MediaKind::Edited => &mut self.edited,
        }
    }
}

/// Errors from the content store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unknown media type '{0}' (expected all, images, videos or edited)")]
    UnknownMediaType(String),

    #[error("file type not allowed: {0}")]
    UnsupportedFile(String),
}

/// Handle on the content directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir(MediaKind::Images)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.dir(MediaKind::Videos)
    }

    pub fn edited_dir(&self) -> PathBuf {
        self.dir(MediaKind::Edited)
    }

    /// Create the artifact directories if they are missing.
    pub fn ensure_layout(&self) -> Result<(), StorageError> {
        for kind in MediaKind::ALL {
            let dir = self.dir(kind);
            std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io { path: dir, source })?;
        }
        Ok(())
    }

    /// List media files, newest first within each kind.
    ///
    /// Missing directories list as empty.
    pub async fn list(&self, filter: MediaFilter) -> Result<MediaListing, StorageError> {
        let mut listing = MediaListing::default();
        for kind in MediaKind::ALL.into_iter().filter(|&k| filter.includes(k)) {
            let entries = self.list_kind(kind).await?;
            *listing.slot(kind) = entries;
        }
        Ok(listing)
    }

    async fn list_kind(&self, kind: MediaKind) -> Result<Vec<MediaEntry>, StorageError> {
        let dir = self.dir(kind);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let mut entries = Vec::new();
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(StorageError::Io { path: dir, source }),
            };
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() || !kind.accepts(&path) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            entries.push(MediaEntry {
                path: format!("{}/{}", kind.dir_name(), file_name),
                file_name,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.file_name.cmp(&a.file_name)));
        Ok(entries)
    }

    /// Resolve a client-supplied relative path to an existing file.
    ///
    /// Absolute paths and any `..` component are rejected before touching
    /// the filesystem.
    pub async fn resolve_download(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let candidate = Path::new(relative);
        if relative.trim().is_empty() {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(relative.to_string())),
            }
        }

        let full = self.root.join(candidate);
        match tokio::fs::metadata(&full).await {
            Ok(metadata) if metadata.is_file() => Ok(full),
            _ => Err(StorageError::NotFound(relative.to_string())),
        }
    }

    /// Store an uploaded file under `images/` or `videos/` by extension.
    ///
    /// The sanitized name gets a timestamp suffix so uploads never replace
    /// an existing file.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let sanitized = sanitize_file_name(file_name);
        let (stem, ext) = sanitized
            .rsplit_once('.')
            .ok_or_else(|| StorageError::UnsupportedFile(file_name.to_string()))?;
        let kind = MediaKind::for_extension(ext)
            .ok_or_else(|| StorageError::UnsupportedFile(file_name.to_string()))?;
        let stem: String = match stem.trim_matches('.') {
            "" => "upload".to_string(),
            stem => stem.chars().take(MAX_UPLOAD_NAME).collect(),
        };

        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io { path: dir.clone(), source })?;
        let path = dir.join(stamped_name(&stem, &ext.to_lowercase()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Io { path: path.clone(), source })?;
        log::info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Path of `path` relative to the content root, with `/` separators.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// URL path under which the server exposes `path`.
    pub fn web_path(&self, path: &Path) -> Option<String> {
        self.relative(path).map(|rel| format!("/uploads/{}", rel))
    }
}

impl fmt::Display for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}
