//=========================================================================
// Overlay Text
//=========================================================================
//
// Display text applied to an overlay instance when it opens: a label plus
// confirm and cancel button captions.
//
// `OverlayText` is the fully resolved record. `OverlayConfig` is what
// callers pass to `open`; any field left unset falls back to the
// per-overlay default registered with the manager.
//
//=========================================================================

//=== OverlayText =========================================================

/// Fully resolved overlay text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlayText {
    pub label: String,
    pub confirm: String,
    pub cancel: String,
}

impl OverlayText {
    pub fn new(
        label: impl Into<String>,
        confirm: impl Into<String>,
        cancel: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            confirm: confirm.into(),
            cancel: cancel.into(),
        }
    }
}

//=== OverlayConfig =======================================================

/// Per-open text overrides.
///
/// ```
/// # use lifecycle_overlay::prelude::*;
/// let defaults = OverlayText::new("Watch an ad?", "OK", "Cancel");
/// let text = OverlayConfig::new().label("Offer").confirm("Yes").resolve(&defaults);
///
/// assert_eq!(text, OverlayText::new("Offer", "Yes", "Cancel"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlayConfig {
    pub label: Option<String>,
    pub confirm: Option<String>,
    pub cancel: Option<String>,
}

impl OverlayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn confirm(mut self, confirm: impl Into<String>) -> Self {
        self.confirm = Some(confirm.into());
        self
    }

    pub fn cancel(mut self, cancel: impl Into<String>) -> Self {
        self.cancel = Some(cancel.into());
        self
    }

    /// Fills every unset field from `defaults`.
    pub fn resolve(&self, defaults: &OverlayText) -> OverlayText {
        OverlayText {
            label: self.label.clone().unwrap_or_else(|| defaults.label.clone()),
            confirm: self.confirm.clone().unwrap_or_else(|| defaults.confirm.clone()),
            cancel: self.cancel.clone().unwrap_or_else(|| defaults.cancel.clone()),
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
