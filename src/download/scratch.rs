//! Per-request scratch directories.
//!
//! Every request gets its own `req-<uuid>` directory under the scratch
//! root, so concurrent requests for the same song never share a path.
//! The directory is removed by [`ScratchDir::cleanup`] on every exit path;
//! `Drop` is the fallback for panics and cancelled requests.

use crate::conversion::audio::AudioCodec;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

const DIR_PREFIX: &str = "req-";

#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: AtomicBool,
}

impl ScratchDir {
    /// Creates a fresh, empty directory under `root` (creating `root` if needed).
    pub async fn create(root: &Path) -> io::Result<Self> {
        fs_err::tokio::create_dir_all(root).await?;
        let path = root.join(format!("{}{}", DIR_PREFIX, Uuid::new_v4().simple()));
        fs_err::tokio::create_dir(&path).await?;
        log::debug!("Created scratch dir {}", path.display());
        Ok(Self {
            path,
            removed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory and everything in it.
    ///
    /// Idempotent: a second call, or a directory that is already gone,
    /// is not an error.
    pub async fn cleanup(&self) -> io::Result<()> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match ignore_not_found(fs_err::tokio::remove_dir_all(&self.path).await) {
            Ok(()) => {
                log::debug!("Removed scratch dir {}", self.path.display());
                Ok(())
            }
            Err(e) => {
                self.removed.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = ignore_not_found(std::fs::remove_dir_all(&self.path)) {
            log::warn!("Failed to remove scratch dir {} on drop: {}", self.path.display(), e);
        }
    }
}

/// Finds the audio file a provider produced in `dir`.
///
/// Prefers a file in `preferred` codec, then any recognised audio file.
/// Partial downloads and sidecar files are ignored. Ties break by name so
/// the choice is deterministic.
pub async fn locate_audio_file(dir: &Path, preferred: AudioCodec) -> io::Result<Option<PathBuf>> {
    let mut found: Vec<(PathBuf, AudioCodec)> = Vec::new();
    let mut entries = fs_err::tokio::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(codec) = AudioCodec::from_path(&path) {
            found.push((path, codec));
        }
    }

    found.sort_by(|a, b| (a.1 != preferred, &a.0).cmp(&(b.1 != preferred, &b.0)));
    Ok(found.into_iter().next().map(|(path, _)| path))
}

/// Removes everything inside `dir`, keeping the directory itself.
pub async fn clear_dir(dir: &Path) -> io::Result<()> {
    let mut entries = fs_err::tokio::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            fs_err::tokio::remove_dir_all(&path).await
        } else {
            fs_err::tokio::remove_file(&path).await
        };
        ignore_not_found(result)?;
    }
    Ok(())
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
