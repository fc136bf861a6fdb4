//! Gallery client: progressive, viewport-driven image loading.
//!
//! Each image starts as a placeholder, swaps in its tiny preview once that is
//! decoded, and upgrades to full resolution when the activation policy allows.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    GalleryDriver                     │
//! │  (owns the event loop, spawns and cancels fetches)   │
//! └───────┬───────────────────┬──────────────────┬───────┘
//!         │                   │                  │
//!         ▼                   ▼                  ▼
//! ┌───────────────┐  ┌──────────────────┐  ┌─────────────┐
//! │ViewportObserver│ │ViewportController│  │ TierFetcher │
//! │ (visibility)  │  │ (state machine)  │  │ (list/fetch)│
//! └───────────────┘  └────────┬─────────┘  └─────────────┘
//!                             │
//!                             ▼
//!                     render_gallery()
//! ```
//!
//! # Components
//!
//! - [`ViewportController`]: per-image states and the batch-readiness barrier
//! - [`GeometryObserver`]: visibility from slot layout and scroll position
//! - [`render`]: pure state-to-frame projection
//! - [`GalleryDriver`]: async host tying the pieces to a [`TierFetcher`]
//!
//! [`TierFetcher`]: crate::retrieval::TierFetcher

mod controller;
mod driver;
mod observer;
mod render;

pub use controller::{ActivationPolicy, Command, ImageState, ViewportController, ViewportEvent};
pub use driver::{DecodedImage, GalleryDriver};
pub use observer::{
    GeometryObserver, ObserverOptions, Slot, ViewportObserver, DEFAULT_ROOT_MARGIN_PX,
    DEFAULT_THRESHOLD,
};
pub use render::{render, render_gallery, Frame};
