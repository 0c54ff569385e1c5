//! In-memory page used by the integration tests.
//!
//! `FakePage` behaves like a scrollable document: it tracks scroll position,
//! inline styles of pinned elements, document overflow and the progress bar,
//! and answers captures with a solid-color PNG per scroll position so the
//! composite can be checked band by band.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rfcapture::page::{ElementRef, PageMetrics, PinnedSnapshot, StyleProperty};
use rfcapture::{CaptureConfig, EncodedImage, Error, PageDriver, Result, SectionMerger, ViewportCapture};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const PALETTE: [[u8; 4]; 4] = [
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [0, 0, 255, 255],
    [255, 255, 0, 255],
];

pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> EncodedImage {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    EncodedImage::new(buf)
}

pub fn decode(image: &EncodedImage) -> RgbaImage {
    image::load_from_memory(image.as_bytes()).unwrap().to_rgba8()
}

/// Element handle the page uses for the progress bar.
pub const PROGRESS_BAR: ElementRef = ElementRef(u32::MAX);

/// Config with delays shrunk so tests run fast.
pub fn fast_config() -> CaptureConfig {
    CaptureConfig {
        settle_delay_ms: 0,
        handshake_delay_ms: 1,
        host_settle_delay_ms: 1,
        ..Default::default()
    }
}

/// What the page looked like at the moment a capture was taken.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub scroll_y: u32,
    pub pinned_display: Vec<String>,
    pub progress_visible: bool,
    pub progress_percent: f64,
    pub overflow: String,
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub percent: f64,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct State {
    scroll_y: u32,
    overflow: String,
    styles: HashMap<ElementRef, HashMap<StyleProperty, String>>,
    progress: Option<Progress>,
    helpers_installed: bool,
    frames: u32,
    captures: Vec<CaptureRecord>,
    mutations: u32,
}

pub struct FakePage {
    pub width: u32,
    pub viewport_height: u32,
    pub total_height: u32,
    pub pinned: Vec<PinnedSnapshot>,
    /// Zero-based capture calls that answer without data
    pub missing_captures: Vec<usize>,
    /// Pings that fail before the helpers answer
    pub unreachable_pings: u32,
    pub fail_install: bool,
    pings: AtomicU32,
    state: Mutex<State>,
}

impl FakePage {
    pub fn new(width: u32, viewport_height: u32, total_height: u32) -> Self {
        Self {
            width,
            viewport_height,
            total_height,
            pinned: Vec::new(),
            missing_captures: Vec::new(),
            unreachable_pings: 0,
            fail_install: false,
            pings: AtomicU32::new(0),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a fixed header whose inline styles are `position: fixed; top: 0`.
    pub fn with_fixed_header(mut self) -> Self {
        let element = ElementRef(self.pinned.len() as u32);
        let snap = PinnedSnapshot {
            element,
            position: "fixed".into(),
            top: "0px".into(),
            display: "block".into(),
            z_index: "100".into(),
        };
        let mut styles = HashMap::new();
        for p in StyleProperty::ALL {
            styles.insert(p, snap.original(p).to_string());
        }
        self.state.lock().unwrap().styles.insert(element, styles);
        self.pinned.push(snap);
        self
    }

    pub fn scrolled_to(self, y: u32) -> Self {
        self.state.lock().unwrap().scroll_y = y;
        self
    }

    pub fn with_overflow(self, overflow: &str) -> Self {
        self.state.lock().unwrap().overflow = overflow.to_string();
        self
    }

    pub fn scroll_y(&self) -> u32 {
        self.state.lock().unwrap().scroll_y
    }

    pub fn overflow(&self) -> String {
        self.state.lock().unwrap().overflow.clone()
    }

    pub fn style(&self, element: ElementRef, property: StyleProperty) -> String {
        self.state.lock().unwrap().styles[&element][&property].clone()
    }

    /// Whether any inline style was ever written to `element`.
    pub fn styled(&self, element: ElementRef) -> bool {
        self.state.lock().unwrap().styles.contains_key(&element)
    }

    pub fn progress(&self) -> Option<Progress> {
        self.state.lock().unwrap().progress.clone()
    }

    pub fn captures(&self) -> Vec<CaptureRecord> {
        self.state.lock().unwrap().captures.clone()
    }

    pub fn mutations(&self) -> u32 {
        self.state.lock().unwrap().mutations
    }

    pub fn frames(&self) -> u32 {
        self.state.lock().unwrap().frames
    }

    pub fn pings(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        f(&mut state)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn install_helpers(&self) -> Result<()> {
        if self.fail_install {
            return Err(Error::Unreachable("cannot access contents of the page".into()));
        }
        self.state.lock().unwrap().helpers_installed = true;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let n = self.pings.fetch_add(1, Ordering::SeqCst);
        if n < self.unreachable_pings || !self.state.lock().unwrap().helpers_installed {
            return Err(Error::Unreachable("Receiving end does not exist".into()));
        }
        Ok(())
    }

    async fn measure(&self) -> Result<PageMetrics> {
        Ok(PageMetrics {
            body_scroll_height: self.total_height.saturating_sub(16),
            document_scroll_height: self.total_height,
            body_offset_height: self.total_height.saturating_sub(16),
            document_offset_height: self.total_height,
            viewport_height: self.viewport_height,
            scroll_y: self.scroll_y(),
        })
    }

    async fn find_pinned(&self) -> Result<Vec<PinnedSnapshot>> {
        let mut found = self.pinned.clone();
        // The progress bar is `position: fixed` too, so a scan made while it
        // is attached picks it up like any other pinned element.
        if self.state.lock().unwrap().progress.is_some() {
            found.push(PinnedSnapshot {
                element: PROGRESS_BAR,
                position: "fixed".into(),
                top: "0px".into(),
                display: "block".into(),
                z_index: "2147483647".into(),
            });
        }
        Ok(found)
    }

    async fn set_style(&self, element: ElementRef, property: StyleProperty, value: &str) -> Result<()> {
        self.mutate(|s| {
            s.styles
                .entry(element)
                .or_default()
                .insert(property, value.to_string());
        });
        Ok(())
    }

    async fn document_overflow(&self) -> Result<String> {
        Ok(self.overflow())
    }

    async fn set_document_overflow(&self, value: &str) -> Result<()> {
        self.mutate(|s| s.overflow = value.to_string());
        Ok(())
    }

    async fn scroll_to(&self, y: u32) -> Result<()> {
        let max = self.total_height.saturating_sub(self.viewport_height);
        self.mutate(|s| s.scroll_y = y.min(max));
        Ok(())
    }

    async fn insert_progress(&self, _color: &str) -> Result<()> {
        self.mutate(|s| {
            s.progress = Some(Progress {
                percent: 0.0,
                visible: true,
            })
        });
        Ok(())
    }

    async fn set_progress(&self, percent: f64) -> Result<()> {
        self.mutate(|s| {
            if let Some(p) = s.progress.as_mut() {
                p.percent = percent;
            }
        });
        Ok(())
    }

    async fn set_progress_visible(&self, visible: bool) -> Result<()> {
        self.mutate(|s| {
            if let Some(p) = s.progress.as_mut() {
                p.visible = visible;
            }
        });
        Ok(())
    }

    async fn remove_progress(&self) -> Result<bool> {
        Ok(self.mutate(|s| s.progress.take().is_some()))
    }

    async fn next_frame(&self) -> Result<()> {
        self.state.lock().unwrap().frames += 1;
        Ok(())
    }
}

#[async_trait]
impl ViewportCapture for FakePage {
    async fn capture_visible(&self) -> Result<Option<EncodedImage>> {
        let mut state = self.state.lock().unwrap();
        let index = state.captures.len();
        let record = CaptureRecord {
            scroll_y: state.scroll_y,
            pinned_display: self
                .pinned
                .iter()
                .map(|p| state.styles[&p.element][&StyleProperty::Display].clone())
                .collect(),
            progress_visible: state.progress.as_ref().map(|p| p.visible).unwrap_or(false),
            progress_percent: state.progress.as_ref().map(|p| p.percent).unwrap_or(0.0),
            overflow: state.overflow.clone(),
        };
        state.captures.push(record);

        if self.missing_captures.contains(&index) {
            return Ok(None);
        }
        let color = PALETTE[index % PALETTE.len()];
        Ok(Some(solid_png(self.width, self.viewport_height, color)))
    }
}

/// Merges directly with the compositor, counting calls.
#[derive(Default)]
pub struct DirectMerger {
    pub calls: AtomicU32,
}

#[async_trait]
impl SectionMerger for DirectMerger {
    async fn merge_sections(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(rfcapture::compositor::merge(&images, &heights)?)
    }
}

/// A merger that always fails, for exercising cleanup after merge errors.
pub struct FailingMerger;

#[async_trait]
impl SectionMerger for FailingMerger {
    async fn merge_sections(&self, _images: Vec<EncodedImage>, _heights: Vec<u32>) -> Result<EncodedImage> {
        Err(Error::HostingContextError("No response from compositor".into()))
    }
}
