//=========================================================================
// Global Core State
//=========================================================================
//
// The wired-up pair of subsystems handed to the host application.
//
// Architecture:
//   CoreContext<K>
//     ├─ router:   LifecycleRouter        (mode source from CoreBuilder)
//     ├─ overlays: OverlayManager<K>      (attached to router)
//     └─ hooks:    Vec<Subscription>      (overlay terminate/initialize)
//
//=========================================================================

//=== Module Declarations =================================================

mod core_context;

//=== Public API ==========================================================

pub use core_context::CoreContext;
