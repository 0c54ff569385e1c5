//! Destinations for finished captures

use crate::{EncodedImage, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which capture produced an image; decides the file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Visible,
    FullPage,
}

impl CaptureKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CaptureKind::Visible => "visible",
            CaptureKind::FullPage => "fullpage",
        }
    }

    /// `<prefix>_<epoch-ms>.png`
    pub fn file_name(self, epoch_ms: u128) -> String {
        format!("{}_{}.png", self.prefix(), epoch_ms)
    }
}

fn now_epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Where finished images go. Returns a description of where the image ended
/// up (a path for file sinks).
pub trait ImageSink: Send + Sync {
    fn store(&self, kind: CaptureKind, image: &EncodedImage) -> Result<String>;
}

/// Writes each image into a directory as `<prefix>_<epoch-ms>.png`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ImageSink for DirectorySink {
    fn store(&self, kind: CaptureKind, image: &EncodedImage) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(kind.file_name(now_epoch_ms()));
        std::fs::write(&path, image.as_bytes())?;
        info!("saved {} bytes to {}", image.len(), path.display());
        Ok(path.display().to_string())
    }
}

/// Keeps images in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    stored: Mutex<Vec<(String, EncodedImage)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything stored so far, as (file name, image) in arrival order.
    pub fn stored(&self) -> Vec<(String, EncodedImage)> {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ImageSink for MemorySink {
    fn store(&self, kind: CaptureKind, image: &EncodedImage) -> Result<String> {
        let name = kind.file_name(now_epoch_ms());
        if let Ok(mut stored) = self.stored.lock() {
            stored.push((name.clone(), image.clone()));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_capture_kind() {
        assert_eq!(CaptureKind::Visible.file_name(1700000000000), "visible_1700000000000.png");
        assert_eq!(CaptureKind::FullPage.file_name(42), "fullpage_42.png");
    }

    #[test]
    fn directory_sink_writes_png_bytes() {
        let dir = std::env::temp_dir().join(format!("rfcapture-sink-{}", std::process::id()));
        let sink = DirectorySink::new(&dir);
        let stored = sink
            .store(CaptureKind::FullPage, &EncodedImage::new(vec![1, 2, 3]))
            .unwrap();

        let path = PathBuf::from(&stored);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("fullpage_"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn memory_sink_keeps_arrival_order() {
        let sink = MemorySink::new();
        sink.store(CaptureKind::Visible, &EncodedImage::new(vec![1])).unwrap();
        sink.store(CaptureKind::FullPage, &EncodedImage::new(vec![2])).unwrap();
        let stored = sink.stored();
        assert!(stored[0].0.starts_with("visible_"));
        assert!(stored[1].0.starts_with("fullpage_"));
    }
}
