//! Compositor hosting context
//!
//! At most one host exists at a time. It is created when a merge needs it,
//! waits a short settle delay before taking work, and is closed as soon as
//! the lease on it is dropped.

use crate::compositor;
use crate::{EncodedImage, Error, MergeError, Result};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};

type MergeReply = std::result::Result<EncodedImage, MergeError>;

enum Command {
    Merge {
        images: Vec<EncodedImage>,
        heights: Vec<u32>,
        reply: oneshot::Sender<MergeReply>,
    },
    Close,
}

/// The isolated context the compositor runs in: a dedicated thread that owns
/// the drawing work and answers merge commands.
struct HostWorker {
    cmd_tx: Sender<Command>,
}

impl HostWorker {
    async fn spawn() -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("rfcapture-compositor".into())
            .spawn(move || {
                let _ = init_tx.send(());

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Merge { images, heights, reply } => {
                            let res = compositor::merge(&images, &heights);
                            if let Err(e) = &res {
                                warn!("Merge error: {}", e);
                            }
                            let _ = reply.send(res);
                        }
                        Command::Close => break,
                    }
                }
                debug!("compositor host thread exiting");
            })
            .map_err(|e| Error::HostingContextError(format!("Failed to start compositor: {}", e)))?;

        init_rx
            .await
            .map_err(|_| Error::HostingContextError("Compositor exited during startup".into()))?;

        Ok(Self { cmd_tx })
    }

    async fn merge(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage> {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Merge { images, heights, reply: tx })
            .is_err()
        {
            return Err(no_response());
        }
        reply_to_result(rx.await.ok())
    }

    fn close(self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

fn no_response() -> Error {
    Error::HostingContextError("No response from compositor".into())
}

/// Map what came back from the compositor to the caller-facing result.
///
/// A missing reply (the host went away) is reported distinctly from a merge
/// the compositor ran and rejected.
pub(crate) fn reply_to_result(reply: Option<MergeReply>) -> Result<EncodedImage> {
    match reply {
        None => Err(no_response()),
        Some(Err(e)) => Err(Error::MergeFailure(e)),
        Some(Ok(image)) => Ok(image),
    }
}

/// Owner of the process-wide compositor hosting context.
///
/// At most one host exists at a time. It is created lazily by
/// [`CompositorHost::acquire`] and torn down when the returned lease drops,
/// whichever way the merge ended. Concurrent acquirers wait for the lease.
#[derive(Clone)]
pub struct CompositorHost {
    slot: Arc<Mutex<Option<HostWorker>>>,
    open: Arc<AtomicBool>,
    launches: Arc<AtomicU64>,
    settle_delay: Duration,
}

impl CompositorHost {
    /// `settle_delay` is waited once after each fresh host comes up.
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            open: Arc::new(AtomicBool::new(false)),
            launches: Arc::new(AtomicU64::new(0)),
            settle_delay,
        }
    }

    /// Whether a hosting context is currently alive.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// How many hosting contexts have been created so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Take exclusive use of the hosting context, creating it if needed.
    pub async fn acquire(&self) -> Result<HostLease> {
        let mut slot = self.slot.clone().lock_owned().await;
        if slot.is_none() {
            let worker = HostWorker::spawn().await?;
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.open.store(true, Ordering::SeqCst);
            debug!("compositor host created; settling for {}ms", self.settle_delay.as_millis());
            *slot = Some(worker);
            tokio::time::sleep(self.settle_delay).await;
        }
        Ok(HostLease {
            slot,
            open: self.open.clone(),
        })
    }
}

/// Exclusive use of a live compositor host. Dropping the lease closes the host.
pub struct HostLease {
    slot: OwnedMutexGuard<Option<HostWorker>>,
    open: Arc<AtomicBool>,
}

impl HostLease {
    pub async fn merge(&self, images: Vec<EncodedImage>, heights: Vec<u32>) -> Result<EncodedImage> {
        match self.slot.as_ref() {
            Some(worker) => worker.merge(images, heights).await,
            None => Err(no_response()),
        }
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        if let Some(worker) = self.slot.take() {
            worker.close();
            debug!("compositor host closed");
        }
        self.open.store(false, Ordering::SeqCst);
    }
}
