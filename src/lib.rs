//=========================================================================
// Lifecycle Overlay - Library Root
//
// Lifecycle event routing and a single-instance overlay stack for game
// front-ends.
//
// Responsibilities:
// - Route raw lifecycle signals (startup, per-frame ticks, mode changes,
//   quit) to callbacks filtered by edit/play mode
// - Manage modal overlays: one live instance per type, a shared open
//   stack, confirm/cancel continuations, and open/closed/back broadcasts
// - Optionally drive both from a winit event loop (`platform` feature)
//
// Typical usage:
// ```no_run
// use lifecycle_overlay::prelude::*;
//
// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
// enum Menu { Pause }
// impl OverlayKey for Menu {}
//
// fn main() {
//     let core = CoreBuilder::<Menu>::new().build();
//     core.run().unwrap();
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` contains the router, the overlay stack and their wiring. It is
// usable without any windowing backend.
//
pub mod core;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `platform` contains the winit integration and is only compiled with the
// `platform` feature. Its sole entry point is `CoreContext::run`.
//
// `builder` defines `CoreBuilder`, the configuration entry point.
//
#[cfg(feature = "platform")]
mod platform;
mod builder;

#[cfg(test)]
mod test_support;

//--- Public Exports ------------------------------------------------------
//
// Re-exports the builder and context at the crate root so applications
// can `use lifecycle_overlay::CoreBuilder;` directly.
//
pub use builder::CoreBuilder;
pub use crate::core::globals::CoreContext;

#[cfg(feature = "platform")]
pub use platform::PlatformError;
