//! On-disk scratch space for one request's artifacts.
//!
//! Uploads land in the upload directory as `{stamp}_{sanitized-base}{ext}`,
//! generated documents in the output directory as `output_{stamp}.pdf`. The
//! stamp is strictly monotonic process-wide, so concurrent requests can never
//! collide even when the wall clock stalls.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, warn};

use crate::models::{ImageKind, UploadedImage};

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Next unique naming token: the current microsecond timestamp, bumped past
/// the last issued value when issued within the same tick.
fn next_stamp() -> u64 {
    let now = Utc::now().timestamp_micros().max(0) as u64;
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(
            last,
            candidate,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}

/// Reduces a client-supplied name fragment to the `[A-Za-z0-9_-]` allow-list;
/// every other character (spaces, unicode, path separators) becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn split_original_name(original: &str) -> (String, String) {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", sanitize_file_name(&e.to_string_lossy())))
        .unwrap_or_default();

    let base = sanitize_file_name(&stem);
    let base = if base.is_empty() {
        "image".to_string()
    } else {
        base
    };
    (base, ext)
}

/// Owns the two scratch directories and the naming of everything in them.
#[derive(Debug, Clone)]
pub struct TransientStore {
    upload_dir: PathBuf,
    generated_dir: PathBuf,
}

impl TransientStore {
    /// Binds the store to its directories, creating them if absent.
    pub fn new(upload_dir: &Path, generated_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(upload_dir)?;
        std::fs::create_dir_all(generated_dir)?;
        Ok(TransientStore {
            upload_dir: upload_dir.to_path_buf(),
            generated_dir: generated_dir.to_path_buf(),
        })
    }

    /// Writes one accepted part to disk under a collision-free name.
    pub async fn persist(
        &self,
        original_name: &str,
        kind: ImageKind,
        data: Bytes,
    ) -> io::Result<UploadedImage> {
        let (base, ext) = split_original_name(original_name);
        let stored_name = format!("{}_{}{}", next_stamp(), base, ext);
        let path = self.upload_dir.join(&stored_name);

        tokio::fs::write(&path, &data).await?;
        debug!(
            original = original_name,
            stored = %path.display(),
            bytes = data.len(),
            "upload persisted"
        );

        Ok(UploadedImage {
            original_name: original_name.to_string(),
            stored_name,
            path,
            kind,
            size: data.len(),
        })
    }

    /// Fresh unique path for a generated document, independent of any input
    /// filename.
    pub fn allocate_output_path(&self) -> PathBuf {
        self.generated_dir
            .join(format!("output_{}.pdf", next_stamp()))
    }

    /// Best-effort delete. Failures are logged and swallowed: by the time we
    /// release artifacts the response has already been settled.
    pub fn release(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "temp file already gone")
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp file"),
        }
    }
}
