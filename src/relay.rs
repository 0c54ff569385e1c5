//! Capture relay: the privileged side of the pipeline
//!
//! The relay owns the single-viewport capture primitive, starts full-page
//! walks once the page answers the handshake, and runs merges inside a
//! freshly created compositor host that is always torn down afterwards.

use crate::host::CompositorHost;
use crate::protocol::{ImageReply, Request, Response, Status};
use crate::retry::{retry, RetryPolicy};
use crate::sink::{CaptureKind, ImageSink};
use crate::walker::PageWalker;
use crate::{CaptureConfig, CaptureTarget, EncodedImage, Error, Result, SectionMerger, ViewportCapture};
use async_trait::async_trait;
use log::{error, info};

/// Capture what is currently visible. Fails when the platform returns no data.
pub async fn capture_viewport<C: ViewportCapture + ?Sized>(capture: &C) -> Result<EncodedImage> {
    match capture.capture_visible().await? {
        Some(image) if !image.is_empty() => Ok(image),
        _ => Err(Error::SectionCaptureFailure("No image data captured".into())),
    }
}

/// Routes capture requests: owns the page walker, the compositor host and
/// the sink that receives finished captures.
pub struct CaptureRelay<S: ImageSink> {
    config: CaptureConfig,
    walker: PageWalker,
    host: CompositorHost,
    sink: S,
}

impl<S: ImageSink> CaptureRelay<S> {
    pub fn new(config: CaptureConfig, sink: S) -> Self {
        let walker = PageWalker::new(config.clone());
        let host = CompositorHost::new(config.host_settle_delay());
        Self {
            config,
            walker,
            host,
            sink,
        }
    }

    pub fn walker(&self) -> &PageWalker {
        &self.walker
    }

    pub fn host(&self) -> &CompositorHost {
        &self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn handshake_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.handshake_retries, self.config.handshake_delay())
    }

    /// Install the page helpers, wait for them to answer, then walk the page.
    ///
    /// The handshake is retried while the page is unreachable; once it
    /// answers, the walk itself runs exactly once.
    pub async fn relay_full_page_capture<T: CaptureTarget + ?Sized>(&self, target: &T) -> Result<EncodedImage> {
        self.handshake(target).await?;
        self.walker.capture_full_page(target, self).await
    }

    /// Inject the helpers and wait until the page answers a ping.
    pub async fn handshake<T: CaptureTarget + ?Sized>(&self, target: &T) -> Result<()> {
        target
            .install_helpers()
            .await
            .map_err(|e| Error::InjectionFailure(e.to_string()))?;

        retry(self.handshake_policy(), |_| target.ping()).await
    }

    /// Merge sections in a compositor host created for this call.
    ///
    /// The host is closed when this returns, whether the merge worked or not.
    pub async fn relay_merge(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage> {
        let lease = self.host.acquire().await?;
        let merged = lease.merge(images, heights).await;
        drop(lease);
        if let Err(e) = &merged {
            error!("Merge error: {}", e);
        }
        merged
    }

    /// Capture the visible viewport and hand it to the sink.
    pub async fn capture_visible<C: ViewportCapture + ?Sized>(&self, capture: &C) -> Result<String> {
        let image = capture_viewport(capture).await?;
        self.sink.store(CaptureKind::Visible, &image)
    }

    /// Answer one request. `target` is the page the request applies to, if any.
    pub async fn handle<T: CaptureTarget + ?Sized>(&self, target: Option<&T>, request: Request) -> Response {
        match request {
            Request::CaptureVisible => match target {
                None => Response::failure(&Error::NoActiveTarget),
                Some(t) => match self.capture_visible(t).await {
                    Ok(_) => Response::success(),
                    Err(e) => {
                        error!("Visible capture error: {}", e);
                        Response::failure(&e)
                    }
                },
            },
            Request::CaptureFull => match target {
                None => Response::failure(&Error::NoActiveTarget),
                Some(t) => self.handle_capture_full(t).await,
            },
            Request::CaptureViewport => match target {
                None => Response::Image(ImageReply::error(Error::NoActiveTarget.to_string())),
                Some(t) => Response::Image(capture_viewport(t).await.into()),
            },
            Request::MergeSections { images, heights } => {
                Response::Image(self.relay_merge(images, heights).await.into())
            }
        }
    }
}

impl<S: ImageSink> CaptureRelay<S> {
    /// Only failures from inside the walk carry the `Capture failed:` prefix;
    /// handshake and storage errors are reported as they are.
    async fn handle_capture_full<T: CaptureTarget + ?Sized>(&self, target: &T) -> Response {
        if let Err(e) = self.handshake(target).await {
            error!("Handshake error: {}", e);
            return Response::failure(&e);
        }

        let image = match self.walker.capture_full_page(target, self).await {
            Ok(image) => image,
            Err(Error::AlreadyCapturing) => return Response::failure(&Error::AlreadyCapturing),
            Err(e) => {
                return Response::Status(Status::Error {
                    error: format!("Capture failed: {}", e),
                })
            }
        };

        info!("full page composite is {} bytes", image.len());
        match self.sink.store(CaptureKind::FullPage, &image) {
            Ok(_) => Response::success(),
            Err(e) => {
                error!("Failed to store capture: {}", e);
                Response::failure(&e)
            }
        }
    }
}

#[async_trait]
impl<S: ImageSink> SectionMerger for CaptureRelay<S> {
    async fn merge_sections(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage> {
        self.relay_merge(images, heights).await
    }
}
