//! Chrome DevTools Protocol backend
//!
//! [`CdpTarget`] drives one headless Chrome tab. Page-side work goes through a
//! small helper object installed on `window`, and every call returns a JSON
//! string that is parsed on the Rust side. `headless_chrome` is synchronous,
//! so each call runs on tokio's blocking pool.

use crate::page::{ElementRef, PageMetrics, PinnedSnapshot, StyleProperty};
use crate::{CaptureConfig, EncodedImage, Error, PageDriver, Result, ViewportCapture};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

// Installed once per document; re-installing is a no-op.
const HELPERS: &str = r#"(function(){
    if (window.__rfcapture) return JSON.stringify(true);
    const pinned = [];
    let progress = null;
    window.__rfcapture = {
        ready: true,
        measure: function() {
            const b = document.body, d = document.documentElement;
            return {
                body_scroll_height: b ? b.scrollHeight : 0,
                document_scroll_height: d.scrollHeight,
                body_offset_height: b ? b.offsetHeight : 0,
                document_offset_height: d.offsetHeight,
                viewport_height: window.innerHeight,
                scroll_y: Math.round(window.scrollY)
            };
        },
        findPinned: function() {
            pinned.length = 0;
            document.querySelectorAll('*').forEach(function(el) {
                const pos = window.getComputedStyle(el).position;
                if (pos === 'fixed' || pos === 'sticky') pinned.push(el);
            });
            return pinned.map(function(el, i) {
                return { element: i, position: el.style.position, top: el.style.top,
                         display: el.style.display, z_index: el.style.zIndex };
            });
        },
        setStyle: function(i, prop, value) {
            const el = pinned[i];
            if (!el) return false;
            el.style[prop] = value;
            return true;
        },
        overflow: function() { return document.documentElement.style.overflow; },
        setOverflow: function(v) { document.documentElement.style.overflow = v; return true; },
        scrollTo: function(y) { window.scrollTo(0, y); return true; },
        insertProgress: function(color) {
            if (progress && document.body.contains(progress)) return true;
            progress = document.createElement('div');
            progress.style.cssText = 'position: fixed; top: 0; left: 0; height: 4px; width: 0;' +
                'z-index: 2147483647; transition: width 0.3s; background: ' + color + ';';
            document.body.appendChild(progress);
            return true;
        },
        setProgress: function(p) { if (progress) progress.style.width = p + '%'; return true; },
        showProgress: function(visible) { if (progress) progress.style.display = visible ? '' : 'none'; return true; },
        removeProgress: function() {
            const attached = !!(progress && document.body.contains(progress));
            if (attached) document.body.removeChild(progress);
            progress = null;
            return attached;
        }
    };
    return JSON.stringify(true);
})()"#;

/// A headless Chrome tab that can be walked and captured.
pub struct CdpTarget {
    // Kept alive for the lifetime of the tab; dropping it ends the browser process.
    _browser: Browser,
    tab: Arc<Tab>,
    config: CaptureConfig,
}

impl CdpTarget {
    /// Launch headless Chrome with the configured window size and open a tab.
    pub fn launch(config: &CaptureConfig) -> Result<Self> {
        config.validate()?;

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .build()
            .map_err(|e| Error::CdpError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::CdpError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::CdpError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        Ok(Self {
            _browser: browser,
            tab,
            config: config.clone(),
        })
    }

    /// Navigate and wait for the page to settle.
    pub async fn load_url(&self, url: &str) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)
                .map_err(|e| Error::CdpError(format!("Navigation failed: {}", e)))?;
            tab.wait_until_navigated()
                .map_err(|e| Error::CdpError(format!("Wait for navigation failed: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::CdpError(format!("Navigation task failed: {}", e)))??;

        // Wait for the page to stabilize
        tokio::time::sleep(self.config.settle_delay()).await;
        Ok(())
    }

    pub fn url(&self) -> String {
        self.tab.get_url()
    }

    async fn evaluate(&self, expression: String, await_promise: bool) -> Result<Option<serde_json::Value>> {
        let tab = self.tab.clone();
        let remote = tokio::task::spawn_blocking(move || tab.evaluate(&expression, await_promise))
            .await
            .map_err(|e| Error::CdpError(format!("Evaluation task failed: {}", e)))?
            .map_err(|e| Error::CdpError(format!("Evaluation failed: {}", e)))?;
        Ok(remote.value)
    }

    /// Call a helper method and decode its JSON result.
    async fn call<T: DeserializeOwned>(&self, method: &str, args: &[serde_json::Value]) -> Result<T> {
        let args = args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let expression = format!(
            "(function(){{ const h = window.__rfcapture; if (!h) return null; return JSON.stringify(h.{}({})); }})()",
            method, args
        );

        let value = self.evaluate(expression, false).await?;
        let raw = match value {
            Some(serde_json::Value::String(s)) => s,
            _ => return Err(Error::Unreachable(format!("capture helpers not installed ({})", method))),
        };
        serde_json::from_str(&raw).map_err(|e| Error::CdpError(format!("Bad reply from {}: {}", method, e)))
    }
}

#[derive(Deserialize)]
struct RawPinned {
    element: u32,
    position: String,
    top: String,
    display: String,
    z_index: String,
}

#[derive(Deserialize)]
struct RawMetrics {
    body_scroll_height: f64,
    document_scroll_height: f64,
    body_offset_height: f64,
    document_offset_height: f64,
    viewport_height: f64,
    scroll_y: f64,
}

fn px(v: f64) -> u32 {
    v.max(0.0).round() as u32
}

#[async_trait]
impl PageDriver for CdpTarget {
    async fn install_helpers(&self) -> Result<()> {
        let value = self.evaluate(HELPERS.to_string(), false).await?;
        debug!("capture helpers installed on {}", self.url());
        match value {
            Some(_) => Ok(()),
            None => Err(Error::CdpError("helper installation returned nothing".into())),
        }
    }

    async fn ping(&self) -> Result<()> {
        let value = self
            .evaluate(
                "Boolean(window.__rfcapture && window.__rfcapture.ready)".to_string(),
                false,
            )
            .await?;
        match value {
            Some(serde_json::Value::Bool(true)) => Ok(()),
            _ => Err(Error::Unreachable("capture helpers not ready".into())),
        }
    }

    async fn measure(&self) -> Result<PageMetrics> {
        let m: RawMetrics = self.call("measure", &[]).await?;
        Ok(PageMetrics {
            body_scroll_height: px(m.body_scroll_height),
            document_scroll_height: px(m.document_scroll_height),
            body_offset_height: px(m.body_offset_height),
            document_offset_height: px(m.document_offset_height),
            viewport_height: px(m.viewport_height),
            scroll_y: px(m.scroll_y),
        })
    }

    async fn find_pinned(&self) -> Result<Vec<PinnedSnapshot>> {
        let raw: Vec<RawPinned> = self.call("findPinned", &[]).await?;
        Ok(raw
            .into_iter()
            .map(|p| PinnedSnapshot {
                element: ElementRef(p.element),
                position: p.position,
                top: p.top,
                display: p.display,
                z_index: p.z_index,
            })
            .collect())
    }

    async fn set_style(&self, element: ElementRef, property: StyleProperty, value: &str) -> Result<()> {
        let found: bool = self
            .call(
                "setStyle",
                &[element.0.into(), property.js_name().into(), value.into()],
            )
            .await?;
        if !found {
            debug!("pinned element {:?} is gone", element);
        }
        Ok(())
    }

    async fn document_overflow(&self) -> Result<String> {
        self.call("overflow", &[]).await
    }

    async fn set_document_overflow(&self, value: &str) -> Result<()> {
        let _: bool = self.call("setOverflow", &[value.into()]).await?;
        Ok(())
    }

    async fn scroll_to(&self, y: u32) -> Result<()> {
        let _: bool = self.call("scrollTo", &[y.into()]).await?;
        Ok(())
    }

    async fn insert_progress(&self, color: &str) -> Result<()> {
        let _: bool = self.call("insertProgress", &[color.into()]).await?;
        Ok(())
    }

    async fn set_progress(&self, percent: f64) -> Result<()> {
        let _: bool = self.call("setProgress", &[percent.into()]).await?;
        Ok(())
    }

    async fn set_progress_visible(&self, visible: bool) -> Result<()> {
        let _: bool = self.call("showProgress", &[visible.into()]).await?;
        Ok(())
    }

    async fn remove_progress(&self) -> Result<bool> {
        self.call("removeProgress", &[]).await
    }

    async fn next_frame(&self) -> Result<()> {
        self.evaluate(
            "new Promise(function(r){ requestAnimationFrame(function(){ r(true); }); })".to_string(),
            true,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ViewportCapture for CdpTarget {
    async fn capture_visible(&self) -> Result<Option<EncodedImage>> {
        let tab = self.tab.clone();
        let data = tokio::task::spawn_blocking(move || {
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
        .map_err(|e| Error::CdpError(format!("Screenshot task failed: {}", e)))?
        .map_err(|e| Error::CdpError(format!("Screenshot failed: {}", e)))?;

        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(EncodedImage::new(data)))
    }
}
