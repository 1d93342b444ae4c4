//=========================================================================
// Open Requests & Continuations
//=========================================================================
//
// What a caller hands to `OverlayManager::open`: optional text overrides
// plus the deferred confirm/cancel actions to run once the overlay closes.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== Internal Dependencies ===============================================

use super::OverlayConfig;

//=== Continuation ========================================================

/// A deferred action captured when an overlay opens.
///
/// Runs at most once, after its overlay has fully closed. Dropped unrun
/// when the overlay closes through the other button, `close`, or
/// termination.
pub struct Continuation(Box<dyn FnOnce()>);

impl Continuation {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(action))
    }

    pub(crate) fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation(..)")
    }
}

//=== OpenRequest =========================================================

/// Parameters for [`OverlayManager::open`](super::OverlayManager::open).
///
/// An empty request opens with default text and no continuations. When the
/// overlay is already active, text is always re-applied but continuations
/// are only replaced if the request carries them.
///
/// ```
/// # use lifecycle_overlay::prelude::*;
/// let request = OpenRequest::new()
///     .with_config(OverlayConfig::new().label("Offer"))
///     .on_confirm(|| println!("granted"))
///     .on_cancel(|| println!("declined"));
/// # let _ = request;
/// ```
#[derive(Debug, Default)]
pub struct OpenRequest {
    pub(crate) config: Option<OverlayConfig>,
    pub(crate) on_confirm: Option<Continuation>,
    pub(crate) on_cancel: Option<Continuation>,
}

impl OpenRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: OverlayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn on_confirm<F>(mut self, action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_confirm = Some(Continuation::new(action));
        self
    }

    pub fn on_cancel<F>(mut self, action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_cancel = Some(Continuation::new(action));
        self
    }
}

impl From<OverlayConfig> for OpenRequest {
    fn from(config: OverlayConfig) -> Self {
        Self::new().with_config(config)
    }
}
