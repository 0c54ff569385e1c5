//! Page walker: scrolls the page one viewport at a time and captures sections
//!
//! A walk moves through `Idle -> Preparing -> Capturing(n) -> Merging -> Idle`.
//! Any failure goes through `Aborting` and back to `Idle`. Whatever happens,
//! the page is put back the way it was found: pinned elements get their
//! inline styles back, scrollbars reappear, the progress bar is removed and
//! the scroll offset is restored.
//!
//! Fixed and sticky elements are shown in the first section only and hidden in
//! all later ones, so a site header appears once at the top of the composite
//! instead of in every section.

use crate::image_data::split_sections;
use crate::page::{CaptureTarget, PageDriver, PinnedSnapshot, StyleProperty};
use crate::relay::capture_viewport;
use crate::{CaptureConfig, CaptureSection, EncodedImage, Error, Result, SectionMerger};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Where a walker is in its capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    Idle,
    Preparing,
    /// Capturing the section with this zero-based index
    Capturing(u32),
    Merging,
    Aborting,
}

/// Claim on the single active session. Released on drop.
struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl ActiveGuard {
    fn claim(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::AlreadyCapturing)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything one full-page capture changed on the page, and what to put back.
///
/// Fields are filled in as preparation progresses, so [`CaptureSession::restore`]
/// undoes exactly the steps that happened.
#[derive(Debug, Default)]
pub struct CaptureSession {
    pub original_scroll: u32,
    pub total_height: u32,
    pub viewport_height: u32,
    pub sections: Vec<CaptureSection>,
    pub pinned: Vec<PinnedSnapshot>,
    original_overflow: Option<String>,
    progress_inserted: bool,
    measured: bool,
}

impl CaptureSession {
    /// Put the page back. Every step is attempted even if an earlier one
    /// fails; failures are logged, not returned.
    pub async fn restore<D: PageDriver + ?Sized>(&self, driver: &D) {
        for snap in &self.pinned {
            for property in StyleProperty::ALL {
                if let Err(e) = driver.set_style(snap.element, property, snap.original(property)).await {
                    warn!("failed to restore {} on {:?}: {}", property.js_name(), snap.element, e);
                }
            }
        }

        if let Some(overflow) = &self.original_overflow {
            if let Err(e) = driver.set_document_overflow(overflow).await {
                warn!("failed to restore document overflow: {}", e);
            }
        }

        if self.progress_inserted {
            if let Err(e) = driver.remove_progress().await {
                warn!("failed to remove progress indicator: {}", e);
            }
        }

        if self.measured {
            if let Err(e) = driver.scroll_to(self.original_scroll).await {
                warn!("failed to scroll back to {}: {}", self.original_scroll, e);
            }
        }
    }
}

/// Percentage of the page already captured when a section starts.
pub fn progress_percent(total: u32, remaining: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (total - remaining.min(total)) as f64 / total as f64 * 100.0
}

/// Drives full-page captures against one page.
///
/// Only one capture may run at a time per walker; a second request is
/// rejected with [`Error::AlreadyCapturing`] before touching the page.
#[derive(Clone)]
pub struct PageWalker {
    config: CaptureConfig,
    active: Arc<AtomicBool>,
    state: Arc<Mutex<WalkerState>>,
}

impl PageWalker {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(WalkerState::Idle)),
        }
    }

    pub fn state(&self) -> WalkerState {
        self.state.lock().map(|s| *s).unwrap_or(WalkerState::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: WalkerState) {
        if let Ok(mut s) = self.state.lock() {
            *s = next;
        }
    }

    /// Capture every section of the page and merge them into one image.
    ///
    /// Partial results are never returned: a failed section or merge aborts the
    /// whole capture. Page state is restored on every path.
    pub async fn capture_full_page<T, M>(&self, target: &T, merger: &M) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
        M: SectionMerger + ?Sized,
    {
        let _guard = ActiveGuard::claim(&self.active)?;
        self.set_state(WalkerState::Preparing);

        let mut session = CaptureSession::default();
        let result = self.walk(target, merger, &mut session).await;

        if let Err(e) = &result {
            error!("Full page capture error: {}", e);
            self.set_state(WalkerState::Aborting);
        }
        session.restore(target).await;
        self.set_state(WalkerState::Idle);
        result
    }

    async fn walk<T, M>(&self, target: &T, merger: &M, session: &mut CaptureSession) -> Result<EncodedImage>
    where
        T: CaptureTarget + ?Sized,
        M: SectionMerger + ?Sized,
    {
        self.prepare(target, session).await?;
        self.capture_sections(target, session).await?;

        if session.sections.is_empty() {
            return Err(Error::NoSectionsCaptured);
        }

        self.set_state(WalkerState::Merging);
        let (images, heights) = split_sections(std::mem::take(&mut session.sections));
        info!("merging {} sections ({}px total)", images.len(), session.total_height);
        merger.merge_sections(images, heights).await
    }

    async fn prepare<T: CaptureTarget + ?Sized>(&self, target: &T, session: &mut CaptureSession) -> Result<()> {
        let metrics = target.measure().await?;
        session.original_scroll = metrics.scroll_y;
        session.total_height = metrics.total_height();
        session.viewport_height = metrics.viewport_height;
        session.measured = true;
        info!(
            "starting capture: page {}px, viewport {}px, scrolled to {}",
            session.total_height, session.viewport_height, session.original_scroll
        );

        if session.viewport_height == 0 {
            return Err(Error::SectionCaptureFailure("viewport has zero height".into()));
        }

        session.pinned = target.find_pinned().await?;
        debug!("found {} pinned elements", session.pinned.len());

        let overflow = target.document_overflow().await?;
        session.original_overflow = Some(overflow);
        target.set_document_overflow("hidden").await?;

        // Inserted last: the bar is fixed and must not be scanned as pinned.
        target.insert_progress(&self.config.progress_color).await?;
        session.progress_inserted = true;
        Ok(())
    }

    async fn capture_sections<T: CaptureTarget + ?Sized>(&self, target: &T, session: &mut CaptureSession) -> Result<()> {
        let total = session.total_height;
        let mut remaining = total;
        let mut y = 0u32;
        let mut index = 0u32;

        while remaining > 0 {
            self.set_state(WalkerState::Capturing(index));
            let height = session.viewport_height.min(remaining);

            target.set_progress(progress_percent(total, remaining)).await?;
            target.scroll_to(y).await?;
            tokio::time::sleep(self.config.settle_delay()).await;

            self.apply_pinned_policy(target, &session.pinned, y == 0).await?;

            target.set_progress_visible(false).await?;
            for _ in 0..self.config.frame_waits {
                target.next_frame().await?;
            }

            let captured = capture_viewport(target).await.map_err(|e| match e {
                Error::SectionCaptureFailure(_) => e,
                other => Error::SectionCaptureFailure(other.to_string()),
            });
            target.set_progress_visible(true).await?;
            let image = captured?;

            debug!("captured section {} at y={} ({}px)", index, y, height);
            session.sections.push(CaptureSection { image, height });

            y += height;
            remaining -= height;
            index += 1;
        }
        Ok(())
    }

    async fn apply_pinned_policy<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        pinned: &[PinnedSnapshot],
        first_section: bool,
    ) -> Result<()> {
        for snap in pinned {
            if first_section {
                driver.set_style(snap.element, StyleProperty::Position, &snap.position).await?;
                driver.set_style(snap.element, StyleProperty::Display, &snap.display).await?;
            } else {
                driver.set_style(snap.element, StyleProperty::Display, "none").await?;
            }
        }
        Ok(())
    }
}
