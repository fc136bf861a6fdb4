//! Visibility sources.
//!
//! The controller only consumes `(id, visible)` changes; a [`ViewportObserver`]
//! is whatever produces them. [`GeometryObserver`] computes them from slot
//! positions and a scroll offset, the way a browser intersection observer
//! does, including a lookahead margin around the viewport.

use std::collections::HashMap;

use crate::store::ImageId;

/// Default lookahead around the viewport, in pixels.
pub const DEFAULT_ROOT_MARGIN_PX: u32 = 100;

/// Default fraction of a slot that must intersect to count as visible.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Intersection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    /// Pixels added above and below the viewport
    pub root_margin_px: u32,

    /// Minimum intersecting fraction of the slot height, in `[0, 1]`
    pub threshold: f32,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin_px: DEFAULT_ROOT_MARGIN_PX,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Producer of visibility changes for observed slots.
pub trait ViewportObserver {
    /// Start reporting changes for `id`.
    fn observe(&mut self, id: ImageId);

    /// Stop reporting changes for `id`.
    fn unobserve(&mut self, id: ImageId);

    /// Stop reporting changes for every slot.
    fn disconnect(&mut self);

    /// Changes accumulated since the last call.
    fn take_changes(&mut self) -> Vec<(ImageId, bool)>;
}

/// Vertical placement of one placeholder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub top: u32,
    pub height: u32,
}

impl Slot {
    fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }
}

/// Observer driven by explicit layout and scroll positions.
#[derive(Debug, Default)]
pub struct GeometryObserver {
    options: ObserverOptions,
    slots: HashMap<ImageId, Slot>,
    /// Observed ids and their last reported visibility
    observed: HashMap<ImageId, bool>,
    viewport: Option<Slot>,
    pending: Vec<(ImageId, bool)>,
}

impl GeometryObserver {
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Position one slot.
    pub fn place(&mut self, id: ImageId, slot: Slot) {
        self.slots.insert(id, slot);
        self.evaluate(id);
    }

    /// Stack slots of equal height in a single column, in the given order.
    pub fn place_column(&mut self, ids: &[ImageId], slot_height: u32) {
        for (index, id) in ids.iter().enumerate() {
            let top = u32::try_from(index)
                .unwrap_or(u32::MAX)
                .saturating_mul(slot_height);
            self.place(
                *id,
                Slot {
                    top,
                    height: slot_height,
                },
            );
        }
    }

    /// Move the viewport and record every visibility change it causes.
    pub fn scroll_to(&mut self, top: u32, height: u32) {
        self.viewport = Some(Slot { top, height });
        let ids: Vec<ImageId> = self.observed.keys().copied().collect();
        for id in ids {
            self.evaluate(id);
        }
    }

    pub fn is_observed(&self, id: ImageId) -> bool {
        self.observed.contains_key(&id)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Whether `slot` intersects the margin-expanded viewport enough to count.
    pub fn intersects(&self, slot: Slot) -> bool {
        let Some(viewport) = self.viewport else {
            return false;
        };
        let margin = self.options.root_margin_px;
        let root_top = viewport.top.saturating_sub(margin);
        let root_bottom = viewport.bottom().saturating_add(margin);

        if slot.height == 0 {
            return slot.top >= root_top && slot.top < root_bottom;
        }

        let overlap = slot
            .bottom()
            .min(root_bottom)
            .saturating_sub(slot.top.max(root_top));
        if overlap == 0 {
            return false;
        }
        overlap as f32 / slot.height as f32 >= self.options.threshold
    }

    fn evaluate(&mut self, id: ImageId) {
        let Some(&slot) = self.slots.get(&id) else {
            return;
        };
        let now = self.intersects(slot);
        if let Some(last) = self.observed.get_mut(&id) {
            if *last != now {
                *last = now;
                self.pending.push((id, now));
            }
        }
    }
}

impl ViewportObserver for GeometryObserver {
    fn observe(&mut self, id: ImageId) {
        self.observed.entry(id).or_insert(false);
        self.evaluate(id);
    }

    fn unobserve(&mut self, id: ImageId) {
        self.observed.remove(&id);
        self.pending.retain(|(pending, _)| *pending != id);
    }

    fn disconnect(&mut self) {
        self.observed.clear();
        self.pending.clear();
    }

    fn take_changes(&mut self) -> Vec<(ImageId, bool)> {
        std::mem::take(&mut self.pending)
    }
}
