//! Async host for a [`ViewportController`].
//!
//! The driver owns the controller and is the only place its state changes.
//! Fetch tasks run concurrently, but every completion comes back through one
//! channel and is applied in arrival order, so readiness updates never race.
//!
//! ```text
//!  ViewportObserver ──(id, visible)──┐
//!                                    ▼
//!  fetch tasks ──ViewportEvent──▶ mpsc ──▶ ViewportController::handle()
//!       ▲                                          │
//!       └────────── Fetch / Cancel ◀── Command ────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{ImportError, ProcessingError};
use crate::retrieval::TierFetcher;
use crate::store::{ImageId, Tier};

use super::controller::{ActivationPolicy, Command, ViewportController, ViewportEvent};
use super::observer::ViewportObserver;
use super::render::{render_gallery, Frame};

// =============================================================================
// Decoded Images
// =============================================================================

/// A tier payload decoded to pixels, ready to paint.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl DecodedImage {
    /// Decode an encoded payload (any format the `image` crate reads).
    pub fn decode(data: &[u8]) -> Result<Self, ProcessingError> {
        let decoded = image::load_from_memory(data).map_err(|e| ProcessingError::Decode {
            message: e.to_string(),
        })?;
        let pixels = decoded.to_rgba8();
        Ok(Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        })
    }

    /// Memory held by the pixel buffer.
    pub fn byte_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

async fn fetch_and_decode<F: TierFetcher>(
    fetcher: &F,
    id: ImageId,
    tier: Tier,
) -> Result<DecodedImage, String> {
    let bytes: Bytes = fetcher.fetch(id, tier).await.map_err(|e| e.to_string())?;
    tokio::task::spawn_blocking(move || DecodedImage::decode(&bytes))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

// =============================================================================
// Driver
// =============================================================================

/// Runs one gallery page: listing, visibility, fetches, and teardown.
pub struct GalleryDriver<F: TierFetcher, O: ViewportObserver> {
    fetcher: Arc<F>,
    observer: O,
    controller: ViewportController<DecodedImage>,
    events_tx: mpsc::UnboundedSender<ViewportEvent<DecodedImage>>,
    events_rx: mpsc::UnboundedReceiver<ViewportEvent<DecodedImage>>,
    in_flight: HashMap<(ImageId, Tier), JoinHandle<()>>,
    fetch_log: Vec<(ImageId, Tier)>,
}

impl<F: TierFetcher, O: ViewportObserver> GalleryDriver<F, O> {
    pub fn new(fetcher: Arc<F>, observer: O, policy: ActivationPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            observer,
            controller: ViewportController::new(policy),
            events_tx,
            events_rx,
            in_flight: HashMap::new(),
            fetch_log: Vec::new(),
        }
    }

    /// Fetch the image list and start tracking it.
    ///
    /// On failure the gallery stays empty; the error is logged and returned.
    pub async fn load(&mut self) -> Result<usize, ImportError> {
        let summaries = self.fetcher.list().await.map_err(|e| {
            error!(operation = "list", error = %e, "Failed to load gallery listing");
            e
        })?;

        let commands = self.controller.track(summaries.iter().map(|s| s.id));
        self.execute(commands);
        self.sync_viewport();

        debug!(images = summaries.len(), "Gallery loaded");
        Ok(summaries.len())
    }

    /// Sender for injecting events from an external visibility source.
    pub fn sender(&self) -> mpsc::UnboundedSender<ViewportEvent<DecodedImage>> {
        self.events_tx.clone()
    }

    /// Apply one event and run the resulting commands.
    pub fn dispatch(&mut self, event: ViewportEvent<DecodedImage>) {
        if let Some(key) = event.completes() {
            self.in_flight.remove(&key);
        }
        let commands = self.controller.handle(event);
        self.execute(commands);
        self.sync_viewport();
    }

    /// Forward pending visibility changes from the observer.
    pub fn sync_viewport(&mut self) {
        loop {
            let changes = self.observer.take_changes();
            if changes.is_empty() {
                break;
            }
            for (id, visible) in changes {
                let commands = self.controller.handle(ViewportEvent::Visibility { id, visible });
                self.execute(commands);
            }
        }
    }

    /// Process events until no fetch is outstanding and the queue is empty.
    pub async fn settle(&mut self) {
        loop {
            while let Ok(event) = self.events_rx.try_recv() {
                self.dispatch(event);
            }

            self.in_flight.retain(|_, task| !task.is_finished());
            if self.in_flight.is_empty() {
                match self.events_rx.try_recv() {
                    Ok(event) => {
                        self.dispatch(event);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            if let Some(event) = self.events_rx.recv().await {
                self.dispatch(event);
            }
        }
    }

    /// Cancel outstanding fetches, free every decoded image, stop observing.
    pub fn teardown(&mut self) {
        let commands = self.controller.teardown();
        self.execute(commands);
        for (_, task) in self.in_flight.drain() {
            task.abort();
        }
        debug!("Gallery torn down");
    }

    fn execute(&mut self, commands: Vec<Command<DecodedImage>>) {
        for command in commands {
            match command {
                Command::Observe(id) => self.observer.observe(id),
                Command::Unobserve(id) => self.observer.unobserve(id),
                Command::Disconnect => self.observer.disconnect(),
                Command::Fetch { id, tier } => self.spawn_fetch(id, tier),
                Command::Cancel { id, tier } => {
                    if let Some(task) = self.in_flight.remove(&(id, tier)) {
                        task.abort();
                        debug!(image_id = %id, tier = %tier, "Cancelled fetch");
                    }
                }
                Command::Release { id, handle } => {
                    debug!(image_id = %id, bytes = handle.byte_size(), "Released decoded image");
                    drop(handle);
                }
            }
        }
    }

    fn spawn_fetch(&mut self, id: ImageId, tier: Tier) {
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events_tx.clone();

        debug!(image_id = %id, tier = %tier, "Fetching tier");
        self.fetch_log.push((id, tier));

        let task = tokio::spawn(async move {
            let result = fetch_and_decode(fetcher.as_ref(), id, tier).await;
            if let Err(message) = &result {
                warn!(image_id = %id, tier = %tier, error = %message, "Tier fetch failed");
            }
            let event = match (tier, result) {
                (Tier::Thumbnail, Ok(handle)) => ViewportEvent::PreviewLoaded { id, handle },
                (Tier::Thumbnail, Err(_)) => ViewportEvent::PreviewFailed { id },
                (Tier::FullRes, Ok(handle)) => ViewportEvent::FullLoaded { id, handle },
                (Tier::FullRes, Err(_)) => ViewportEvent::FullFailed { id },
            };
            // A closed channel means the driver is gone and the handle is dropped here
            let _ = events.send(event);
        });

        self.in_flight.insert((id, tier), task);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn controller(&self) -> &ViewportController<DecodedImage> {
        &self.controller
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Every fetch issued so far, in issue order.
    pub fn fetch_log(&self) -> &[(ImageId, Tier)] {
        &self.fetch_log
    }

    /// Fetches started and not yet completed or cancelled.
    pub fn pending_fetches(&self) -> usize {
        self.in_flight.len()
    }

    /// Current frame of every slot, in page order.
    pub fn frames(&self) -> Vec<(ImageId, Frame<'_, DecodedImage>)> {
        render_gallery(&self.controller)
    }
}

impl<F: TierFetcher, O: ViewportObserver> Drop for GalleryDriver<F, O> {
    fn drop(&mut self) {
        for (_, task) in self.in_flight.drain() {
            task.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
