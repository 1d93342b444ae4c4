//=========================================================================
// Core Systems
//
// Platform-independent building blocks of the crate.
//
// Responsibilities:
// - `lifecycle`: route raw lifecycle signals to mode-filtered callbacks
// - `overlay`: single-instance overlays with a shared open stack
// - `globals`: the router and overlay stack, wired together
//
// Notes:
// Everything here is single-threaded (`Rc`/`RefCell`) and runs on the
// host's main loop thread. No module in `core` depends on winit.
//
//=========================================================================

pub mod globals;
pub mod lifecycle;
pub mod overlay;
