//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use lifecycle_overlay::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Entry point
pub use crate::builder::CoreBuilder;
pub use crate::core::globals::CoreContext;

// Lifecycle routing
pub use crate::core::lifecycle::{
    ContextFilter, DispatchReport, InvocationOrigin, LifecycleAction, LifecycleRouter, ModeSource,
    ModeSwitch, RuntimeMode, SourceEvent, Subscription,
};

// Overlay stack
pub use crate::core::overlay::{
    OpenOutcome, OpenRequest, Overlay, OverlayConfig, OverlayError, OverlayEvent, OverlayKey,
    OverlayManager, OverlayState, OverlayText,
};

// Platform bridge
#[cfg(feature = "platform")]
pub use crate::platform::PlatformError;
