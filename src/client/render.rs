//! Pure projection from controller state to what each slot displays.
//!
//! A slot shows its full-resolution image only once that image is fully
//! decoded; until then it shows the placeholder, filled with the preview when
//! one is available. There is no frame in which a slot is blank or partially
//! painted.

use crate::store::ImageId;

use super::controller::{ImageState, ViewportController};

/// What a single slot displays.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a, H> {
    /// Placeholder box, upscaled preview inside once decoded
    Placeholder { preview: Option<&'a H> },
    /// Fully decoded full-resolution image
    Full(&'a H),
}

impl<H> Frame<'_, H> {
    pub fn is_full(&self) -> bool {
        matches!(self, Frame::Full(_))
    }
}

/// Frame for one image given its state and decoded handles.
pub fn render<'a, H>(state: ImageState, preview: Option<&'a H>, full: Option<&'a H>) -> Frame<'a, H> {
    match (state, full) {
        (ImageState::FullReady, Some(full)) => Frame::Full(full),
        _ => Frame::Placeholder { preview },
    }
}

/// Frames for every tracked image, in page order.
pub fn render_gallery<H>(controller: &ViewportController<H>) -> Vec<(ImageId, Frame<'_, H>)> {
    controller
        .ids()
        .iter()
        .filter_map(|&id| {
            let state = controller.state(id)?;
            Some((id, render(state, controller.preview(id), controller.full(id))))
        })
        .collect()
}
