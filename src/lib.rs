//! RFox Full-Page Capture
//!
//! Captures a whole scrollable page as a single image by scrolling the
//! document one viewport at a time, screenshotting each section, and stitching
//! the sections into one PNG.
//!
//! # Pipeline
//!
//! - **Page walker** ([`walker`]): owns page-state mutation (scroll position,
//!   pinned elements, progress indicator) and produces ordered sections
//! - **Capture relay** ([`relay`]): single-viewport capture primitive, the
//!   start-capture handshake with bounded retry, and the compositor's
//!   hosting-context lifecycle
//! - **Compositor** ([`compositor`]): decodes and paints sections top-to-bottom
//!   into one bitmap
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> rfcapture::Result<()> {
//! use rfcapture::{cdp::CdpTarget, relay::CaptureRelay, sink::DirectorySink, CaptureConfig};
//!
//! let config = CaptureConfig::default();
//! let target = CdpTarget::launch(&config)?;
//! target.load_url("https://example.com").await?;
//!
//! let relay = CaptureRelay::new(config.clone(), DirectorySink::new(&config.output_dir));
//! let image = relay.relay_full_page_capture(&target).await?;
//! println!("captured {} bytes", image.len());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod error;
pub use error::{Error, MergeError, Result};

pub mod compositor;
pub mod host;
pub mod image_data;
pub mod page;
pub mod protocol;
pub mod relay;
pub mod retry;
pub mod sink;
pub mod walker;

// CDP backend: drives a headless Chrome tab
#[cfg(feature = "cdp")]
pub mod cdp;

pub use image_data::{CaptureSection, EncodedImage};
pub use page::{CaptureTarget, PageDriver, SectionMerger, ViewportCapture};

/// Configuration for a capture pipeline
///
/// The defaults mirror the timings the capture flow was tuned with: a 400ms
/// settle delay after every scroll, two frame callbacks after hiding the
/// progress bar, and a 3-retry / 300ms start-capture handshake.
///
/// # Examples
///
/// ```
/// let cfg = rfcapture::CaptureConfig::default();
/// assert_eq!(cfg.settle_delay_ms, 400);
/// assert_eq!(cfg.handshake_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Viewport dimensions used when launching a browser
    pub viewport: Viewport,
    /// Timeout for page loads in milliseconds
    pub timeout_ms: u64,
    /// Wait after each scroll before capturing, in milliseconds
    pub settle_delay_ms: u64,
    /// Rendering frames to wait after hiding the progress indicator
    pub frame_waits: u32,
    /// Retries of the start-capture handshake after the first attempt
    pub handshake_retries: u32,
    /// Spacing between handshake attempts in milliseconds
    pub handshake_delay_ms: u64,
    /// Wait for a fresh compositor host to be ready, in milliseconds
    pub host_settle_delay_ms: u64,
    /// CSS color of the progress indicator bar
    pub progress_color: String,
    /// Directory finished images are written to
    pub output_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout_ms: 30000,
            settle_delay_ms: 400,
            frame_waits: 2,
            handshake_retries: 3,
            handshake_delay_ms: 300,
            host_settle_delay_ms: 200,
            progress_color: "#0078d4".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl CaptureConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the capture loop cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.frame_waits == 0 {
            return Err(Error::ConfigError("frame_waits must be at least 1".into()));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    pub fn host_settle_delay(&self) -> Duration {
        Duration::from_millis(self.host_settle_delay_ms)
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
