//=========================================================================
// Overlay Stack
//=========================================================================
//
// Single-instance modal overlays ("menus") with a shared open stack.
//
// Architecture:
//   OverlayManager<K>
//     ├─ slots: HashMap<K, OverlaySlot>   (factory, state, instance,
//     │                                    text, on_confirm, on_cancel)
//     ├─ stack: Vec<K>                    (open order, unique keys)
//     └─ broadcaster                      (Opened / AllClosed / BackRequested)
//
// State machine per key:
//   Closed ──open──> Active ──close/confirm/cancel──> Closing ──> Closed
//   Active ──open──> Active (text refreshed, no re-construction)
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt::Debug;
use std::hash::Hash;

//=== Module Declarations =================================================

mod broadcast;
mod overlay_manager;
mod overlay_text;
mod request;

//=== Public API ==========================================================

pub use broadcast::OverlayEvent;
pub use overlay_manager::{OpenOutcome, OverlayError, OverlayManager, OverlayState};
pub use overlay_text::{OverlayConfig, OverlayText};
pub use request::{Continuation, OpenRequest};

//=== Overlay Key Trait ===================================================

/// Marker trait for overlay identifiers.
///
/// Each key names one overlay type; the manager keeps at most one live
/// instance per key. Typically implemented by a game-specific enum.
pub trait OverlayKey: Clone + Copy + Eq + Hash + Debug + Send + 'static {}

//=== Overlay Trait =======================================================

/// The presentation object behind an overlay key.
///
/// Built by the key's factory on the first `open` and dropped once the
/// overlay closes. Only `apply_text` is required:
///
/// ```rust
/// # use lifecycle_overlay::prelude::*;
/// struct ConfirmDialog {
///     caption: String,
/// }
///
/// impl Overlay for ConfirmDialog {
///     fn apply_text(&mut self, text: &OverlayText) {
///         self.caption = text.label.clone();
///     }
/// }
/// ```
///
/// `apply_text` and `on_open` run while the manager is mid-update and must
/// not call back into it. `on_close` runs after the overlay has left the
/// stack and may open other overlays.
pub trait Overlay {
    /// Shows `text` on the overlay. Called before every `Opened` broadcast
    /// and again on each repeated `open`.
    fn apply_text(&mut self, text: &OverlayText);

    /// Called once after construction and first text application.
    fn on_open(&mut self) {}

    /// Called once during teardown, while the overlay is `Closing`.
    fn on_close(&mut self) {}
}
