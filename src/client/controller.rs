//! Viewport activation controller.
//!
//! A synchronous state machine deciding when each tracked image requests its
//! preview and full-resolution tiers. It consumes [`ViewportEvent`]s one at a
//! time and answers with the [`Command`]s the host must execute (start or
//! cancel fetches, release decoded images, drop observation).
//!
//! # Per-image state
//!
//! ```text
//!  NotVisible ──visible──▶ LoadingPreview ──preview decoded──▶ PreviewReady
//!                                                                  │
//!                                       released by activation policy
//!                                                                  ▼
//!                         FullReady ◀──full decoded── LoadingFull
//! ```
//!
//! # Batch-readiness barrier
//!
//! Under [`ActivationPolicy::Barrier`] no full-resolution fetch starts while
//! any currently visible image is still waiting for its preview. The barrier
//! is re-evaluated after every event, so an out-of-order preview completion
//! releases every image that became ready before it. Images whose preview
//! failed never block the barrier.
//!
//! Every fetch is issued at most once per identity: the `*_requested` flags
//! live in the per-image entry, which survives re-tracking the same id.

use std::collections::HashMap;

use tracing::debug;

use crate::store::{ImageId, Tier};

// =============================================================================
// Public Types
// =============================================================================

/// Lifecycle of one tracked image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageState {
    NotVisible,
    LoadingPreview,
    PreviewReady,
    LoadingFull,
    FullReady,
}

impl ImageState {
    /// Whether the preview has been decoded.
    pub fn has_preview(&self) -> bool {
        *self >= ImageState::PreviewReady
    }
}

/// When a ready preview may upgrade to full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationPolicy {
    /// Wait until every visible image has its preview
    #[default]
    Barrier,
    /// Upgrade each image as soon as its own preview is ready
    PerImage,
}

/// Input signals, delivered one at a time.
#[derive(Debug)]
pub enum ViewportEvent<H> {
    /// The image's placeholder entered or left the observed region
    Visibility { id: ImageId, visible: bool },
    /// Preview bytes fetched and decoded
    PreviewLoaded { id: ImageId, handle: H },
    PreviewFailed { id: ImageId },
    /// Full-resolution bytes fetched and decoded
    FullLoaded { id: ImageId, handle: H },
    FullFailed { id: ImageId },
}

impl<H> ViewportEvent<H> {
    pub fn id(&self) -> ImageId {
        match self {
            ViewportEvent::Visibility { id, .. }
            | ViewportEvent::PreviewLoaded { id, .. }
            | ViewportEvent::PreviewFailed { id }
            | ViewportEvent::FullLoaded { id, .. }
            | ViewportEvent::FullFailed { id } => *id,
        }
    }

    /// The fetch this event completes, if any.
    pub fn completes(&self) -> Option<(ImageId, Tier)> {
        match self {
            ViewportEvent::Visibility { .. } => None,
            ViewportEvent::PreviewLoaded { id, .. } | ViewportEvent::PreviewFailed { id } => {
                Some((*id, Tier::Thumbnail))
            }
            ViewportEvent::FullLoaded { id, .. } | ViewportEvent::FullFailed { id } => {
                Some((*id, Tier::FullRes))
            }
        }
    }
}

/// Side effects requested by the controller.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<H> {
    /// Start watching the placeholder slot
    Observe(ImageId),
    /// Stop watching one slot
    Unobserve(ImageId),
    /// Stop watching everything
    Disconnect,
    /// Request one tier
    Fetch { id: ImageId, tier: Tier },
    /// Abort an in-flight request
    Cancel { id: ImageId, tier: Tier },
    /// Free a decoded image the controller no longer needs
    Release { id: ImageId, handle: H },
}

// =============================================================================
// Controller
// =============================================================================

#[derive(Debug)]
struct Tracked<H> {
    state: ImageState,
    visible: bool,
    observed: bool,
    preview_requested: bool,
    full_requested: bool,
    failed: Option<Tier>,
    preview: Option<H>,
    full: Option<H>,
}

impl<H> Tracked<H> {
    fn new() -> Self {
        Self {
            state: ImageState::NotVisible,
            visible: false,
            observed: true,
            preview_requested: false,
            full_requested: false,
            failed: None,
            preview: None,
            full: None,
        }
    }

    /// Visible and still waiting on a preview that may yet arrive.
    fn blocks_barrier(&self) -> bool {
        self.visible && self.failed.is_none() && !self.state.has_preview()
    }

    fn awaiting_release(&self) -> bool {
        self.state == ImageState::PreviewReady && !self.full_requested && self.failed.is_none()
    }

    fn in_flight(&self) -> Option<Tier> {
        match self.state {
            ImageState::LoadingPreview if self.failed.is_none() => Some(Tier::Thumbnail),
            ImageState::LoadingFull => Some(Tier::FullRes),
            _ => None,
        }
    }
}

/// Per-page controller owning every tracked image's state and decoded
/// handles of type `H`.
#[derive(Debug)]
pub struct ViewportController<H> {
    policy: ActivationPolicy,
    order: Vec<ImageId>,
    images: HashMap<ImageId, Tracked<H>>,
}

impl<H> Default for ViewportController<H> {
    fn default() -> Self {
        Self::new(ActivationPolicy::default())
    }
}

impl<H> ViewportController<H> {
    pub fn new(policy: ActivationPolicy) -> Self {
        Self {
            policy,
            order: Vec::new(),
            images: HashMap::new(),
        }
    }

    pub fn policy(&self) -> ActivationPolicy {
        self.policy
    }

    /// Start tracking images in page order. Ids already tracked keep their
    /// state, so re-rendering the same list never re-issues fetches.
    pub fn track(&mut self, ids: impl IntoIterator<Item = ImageId>) -> Vec<Command<H>> {
        let mut commands = Vec::new();
        for id in ids {
            if self.images.contains_key(&id) {
                continue;
            }
            self.images.insert(id, Tracked::new());
            self.order.push(id);
            commands.push(Command::Observe(id));
        }
        commands
    }

    /// Apply one event.
    pub fn handle(&mut self, event: ViewportEvent<H>) -> Vec<Command<H>> {
        let mut commands = Vec::new();

        match event {
            ViewportEvent::Visibility { id, visible } => {
                let Some(image) = self.images.get_mut(&id) else {
                    debug!(image_id = %id, "Visibility change for untracked image");
                    return commands;
                };
                if !image.observed {
                    return commands;
                }

                image.visible = visible;
                if visible && !image.preview_requested {
                    image.preview_requested = true;
                    image.state = ImageState::LoadingPreview;
                    commands.push(Command::Fetch {
                        id,
                        tier: Tier::Thumbnail,
                    });
                }
            }

            ViewportEvent::PreviewLoaded { id, handle } => match self.images.get_mut(&id) {
                Some(image) if image.state == ImageState::LoadingPreview => {
                    image.preview = Some(handle);
                    image.state = ImageState::PreviewReady;
                }
                _ => commands.push(Command::Release { id, handle }),
            },

            ViewportEvent::PreviewFailed { id } => {
                if let Some(image) = self.images.get_mut(&id) {
                    if image.state == ImageState::LoadingPreview {
                        image.state = ImageState::NotVisible;
                        image.failed = Some(Tier::Thumbnail);
                        Self::stop_observing(id, image, &mut commands);
                    }
                }
            }

            ViewportEvent::FullLoaded { id, handle } => match self.images.get_mut(&id) {
                Some(image) if image.state == ImageState::LoadingFull => {
                    image.full = Some(handle);
                    image.state = ImageState::FullReady;
                    if let Some(preview) = image.preview.take() {
                        commands.push(Command::Release {
                            id,
                            handle: preview,
                        });
                    }
                    Self::stop_observing(id, image, &mut commands);
                }
                _ => commands.push(Command::Release { id, handle }),
            },

            ViewportEvent::FullFailed { id } => {
                if let Some(image) = self.images.get_mut(&id) {
                    if image.state == ImageState::LoadingFull {
                        image.state = ImageState::PreviewReady;
                        image.failed = Some(Tier::FullRes);
                        Self::stop_observing(id, image, &mut commands);
                    }
                }
            }
        }

        self.release_ready(&mut commands);
        commands
    }

    /// Stop tracking one image, cancelling its fetch and freeing its handles.
    pub fn untrack(&mut self, id: ImageId) -> Vec<Command<H>> {
        let mut commands = Vec::new();
        let Some(image) = self.images.remove(&id) else {
            return commands;
        };
        self.order.retain(|tracked| *tracked != id);

        Self::dispose(id, image, &mut commands);
        self.release_ready(&mut commands);
        commands
    }

    /// Tear down the whole page.
    pub fn teardown(&mut self) -> Vec<Command<H>> {
        let mut commands = Vec::new();
        for id in std::mem::take(&mut self.order) {
            if let Some(mut image) = self.images.remove(&id) {
                // Disconnect below covers every slot
                image.observed = false;
                Self::dispose(id, image, &mut commands);
            }
        }
        commands.push(Command::Disconnect);
        commands
    }

    fn dispose(id: ImageId, mut image: Tracked<H>, commands: &mut Vec<Command<H>>) {
        if let Some(tier) = image.in_flight() {
            commands.push(Command::Cancel { id, tier });
        }
        for handle in [image.preview.take(), image.full.take()].into_iter().flatten() {
            commands.push(Command::Release { id, handle });
        }
        if image.observed {
            commands.push(Command::Unobserve(id));
        }
    }

    fn stop_observing(id: ImageId, image: &mut Tracked<H>, commands: &mut Vec<Command<H>>) {
        if image.observed {
            image.observed = false;
            commands.push(Command::Unobserve(id));
        }
    }

    /// Whether the batch-readiness condition currently holds.
    pub fn barrier_open(&self) -> bool {
        !self.images.values().any(Tracked::blocks_barrier)
    }

    fn release_ready(&mut self, commands: &mut Vec<Command<H>>) {
        if self.policy == ActivationPolicy::Barrier && !self.barrier_open() {
            return;
        }

        for id in &self.order {
            let Some(image) = self.images.get_mut(id) else {
                continue;
            };
            if image.awaiting_release() {
                image.full_requested = true;
                image.state = ImageState::LoadingFull;
                commands.push(Command::Fetch {
                    id: *id,
                    tier: Tier::FullRes,
                });
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Tracked ids in page order.
    pub fn ids(&self) -> &[ImageId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn state(&self, id: ImageId) -> Option<ImageState> {
        self.images.get(&id).map(|image| image.state)
    }

    /// The tier whose fetch failed for this image, if any.
    pub fn failure(&self, id: ImageId) -> Option<Tier> {
        self.images.get(&id).and_then(|image| image.failed)
    }

    pub fn is_observed(&self, id: ImageId) -> bool {
        self.images.get(&id).is_some_and(|image| image.observed)
    }

    pub fn preview(&self, id: ImageId) -> Option<&H> {
        self.images.get(&id).and_then(|image| image.preview.as_ref())
    }

    pub fn full(&self, id: ImageId) -> Option<&H> {
        self.images.get(&id).and_then(|image| image.full.as_ref())
    }
}

// =============================================================================
// Tests
// =============================================================================
