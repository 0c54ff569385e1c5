//! Seams between the capture pipeline and the platform it runs against
//!
//! The walker never touches a browser directly. Everything it needs from the
//! page (measuring, scrolling, style mutation, the progress bar, frame waits)
//! goes through [`PageDriver`], and every screenshot goes through
//! [`ViewportCapture`]. The CDP backend implements both for a headless Chrome
//! tab; tests implement them with an in-memory page.

use crate::{EncodedImage, Result};
use async_trait::async_trait;

/// Handle to a page element the driver tagged during the pinned-element scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementRef(pub u32);

/// The inline style properties the walker saves and restores on pinned elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Position,
    Top,
    Display,
    ZIndex,
}

impl StyleProperty {
    pub const ALL: [StyleProperty; 4] = [
        StyleProperty::Position,
        StyleProperty::Top,
        StyleProperty::Display,
        StyleProperty::ZIndex,
    ];

    /// Name of the property on a DOM `style` object.
    pub fn js_name(self) -> &'static str {
        match self {
            StyleProperty::Position => "position",
            StyleProperty::Top => "top",
            StyleProperty::Display => "display",
            StyleProperty::ZIndex => "zIndex",
        }
    }
}

/// Inline style of a fixed/sticky element as it was before the capture began.
///
/// Values are the element's *inline* style strings (often empty), not computed
/// styles; restoring writes them back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PinnedSnapshot {
    pub element: ElementRef,
    pub position: String,
    pub top: String,
    pub display: String,
    pub z_index: String,
}

impl PinnedSnapshot {
    pub fn original(&self, property: StyleProperty) -> &str {
        match property {
            StyleProperty::Position => &self.position,
            StyleProperty::Top => &self.top,
            StyleProperty::Display => &self.display,
            StyleProperty::ZIndex => &self.z_index,
        }
    }
}

/// Raw document measurements. Browsers disagree on which box reports the real
/// document height, so all four candidates are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMetrics {
    pub body_scroll_height: u32,
    pub document_scroll_height: u32,
    pub body_offset_height: u32,
    pub document_offset_height: u32,
    pub viewport_height: u32,
    pub scroll_y: u32,
}

impl PageMetrics {
    pub fn total_height(&self) -> u32 {
        self.body_scroll_height
            .max(self.document_scroll_height)
            .max(self.body_offset_height)
            .max(self.document_offset_height)
    }
}

/// Page-side operations the walker performs. All of them mutate or observe
/// global page state, so a driver is only ever used by one session at a time.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Install the page-side capture helpers. Must be idempotent.
    async fn install_helpers(&self) -> Result<()>;

    /// Check that the helpers answer. Returns `Error::Unreachable` while they
    /// are not registered yet.
    async fn ping(&self) -> Result<()>;

    async fn measure(&self) -> Result<PageMetrics>;

    /// Tag every element whose computed position is fixed or sticky and return
    /// its inline style.
    async fn find_pinned(&self) -> Result<Vec<PinnedSnapshot>>;

    async fn set_style(&self, element: ElementRef, property: StyleProperty, value: &str) -> Result<()>;

    /// Inline `overflow` of the document element.
    async fn document_overflow(&self) -> Result<String>;

    async fn set_document_overflow(&self, value: &str) -> Result<()>;

    async fn scroll_to(&self, y: u32) -> Result<()>;

    async fn insert_progress(&self, color: &str) -> Result<()>;

    async fn set_progress(&self, percent: f64) -> Result<()>;

    async fn set_progress_visible(&self, visible: bool) -> Result<()>;

    /// Detach the progress indicator. Returns whether it was still attached.
    async fn remove_progress(&self) -> Result<bool>;

    /// Resolve after the next rendering frame has been produced.
    async fn next_frame(&self) -> Result<()>;
}

/// The platform's visible-area screenshot facility.
#[async_trait]
pub trait ViewportCapture: Send + Sync {
    /// Capture the current viewport. `Ok(None)` means the platform answered
    /// without image data.
    async fn capture_visible(&self) -> Result<Option<EncodedImage>>;
}

/// A page that can be both driven and captured.
pub trait CaptureTarget: PageDriver + ViewportCapture {}

impl<T: PageDriver + ViewportCapture> CaptureTarget for T {}

/// Turns an ordered section list into one composite image.
#[async_trait]
pub trait SectionMerger: Send + Sync {
    async fn merge_sections(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage>;
}
