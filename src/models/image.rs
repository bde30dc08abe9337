use std::path::PathBuf;

/// The two raster formats the converter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Maps a declared content type onto an accepted kind. Parameters after
    /// the media type (`image/png; something`) are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or("").trim() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// One accepted upload, already persisted into the transient store.
///
/// Lives only for the duration of a single conversion request; the cleanup
/// guard removes the backing file once the response has been settled.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied name, untrusted and never used on disk as-is.
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub kind: ImageKind,
    pub size: usize,
}
