//=========================================================================
// Platform Subsystem
//
// Bridges winit's application lifecycle to the lifecycle router and the
// overlay stack.
//
// Architecture:
// ```text
//  Main Thread:
//  ┌─────────────────────────────────────────────────────────────┐
//  │  Winit Event Loop                                           │
//  │   ├─ new_events(Init)   → Awake                             │
//  │   ├─ resumed            → OnEnable, then Start the first    │
//  │   │                       time        (window created once) │
//  │   ├─ suspended          → OnDisable                         │
//  │   ├─ about_to_wait      → FixedUpdate × N, Update,          │
//  │   │                       LateUpdate                        │
//  │   ├─ KeyboardInput(Esc) → OverlayManager::request_back      │
//  │   ├─ CloseRequested     → exit                              │
//  │   └─ exiting            → ApplicationQuit                   │
//  └─────────────────────────────────────────────────────────────┘
// ```
//
// Everything runs on the thread that called `CoreContext::run`. The
// router and overlay manager are single-threaded, so there is no
// channel hop: callbacks run inline inside the winit callbacks.
//
//=========================================================================

//=== Submodules ==========================================================

mod event_mapper;
mod fixed_step;

//=== External Crates =====================================================

use std::time::Instant;

use log::*;
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

//=== Internal Imports ====================================================

use crate::core::globals::CoreContext;
use crate::core::lifecycle::{LifecycleRouter, SourceEvent};
use crate::core::overlay::{OverlayKey, OverlayManager};
use event_mapper::{is_back_request, resume_events, start_events, EXITING, FRAME_TAIL, SUSPENDED};
use fixed_step::FixedStep;

//=== PlatformError =======================================================

/// Event loop failures. Both are fatal for [`CoreContext::run`].
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("event loop creation failed: {0}")]
    EventLoopCreation(#[source] winit::error::EventLoopError),

    #[error("event loop error: {0}")]
    EventLoopExecution(#[source] winit::error::EventLoopError),
}

//=== Entry Point =========================================================

/// Runs the winit event loop, feeding `core`'s router until exit.
pub(crate) fn run<K: OverlayKey>(core: &CoreContext<K>) -> Result<(), PlatformError> {
    debug!(target: "platform", "Starting winit event loop (TPS: {})", core.tps());

    let event_loop = EventLoop::new().map_err(PlatformError::EventLoopCreation)?;
    let mut bridge = LifecycleBridge::new(core);

    event_loop
        .run_app(&mut bridge)
        .map_err(PlatformError::EventLoopExecution)?;

    info!(target: "platform", "Event loop exited after {} frame(s)", bridge.frames);
    Ok(())
}

//=== LifecycleBridge =====================================================

/// Winit application handler that dispatches source events.
///
/// Holds clones of the context's router and overlay handles, so the
/// context stays usable once the loop exits.
pub(crate) struct LifecycleBridge<K: OverlayKey> {
    router: LifecycleRouter,
    overlays: OverlayManager<K>,
    clock: FixedStep,

    /// Created lazily in `resumed()`.
    window: Option<Window>,

    /// Set once `Start` has been dispatched.
    started: bool,

    frames: u64,
}

impl<K: OverlayKey> LifecycleBridge<K> {
    //--- Construction -----------------------------------------------------

    pub fn new(core: &CoreContext<K>) -> Self {
        info!(target: "platform", "Lifecycle bridge initialized");
        Self {
            router: core.router.clone(),
            overlays: core.overlays.clone(),
            clock: FixedStep::new(core.tps()),
            window: None,
            started: false,
            frames: 0,
        }
    }

    //--- Dispatch Helpers -------------------------------------------------

    fn dispatch(&self, event: SourceEvent) {
        let report = self.router.dispatch(event);
        if report.failed > 0 {
            warn!(
                target: "platform",
                "{} of {} callback(s) for {:?} panicked",
                report.failed,
                report.failed + report.invoked,
                event
            );
        }
    }

    /// Dispatches one frame's tick events and returns when the next fixed
    /// step is due.
    fn run_frame(&mut self, now: Instant) -> Instant {
        let steps = self.clock.tick(now);
        for _ in 0..steps {
            self.dispatch(SourceEvent::FixedUpdate);
        }
        for event in FRAME_TAIL {
            self.dispatch(event);
        }

        self.frames += 1;
        trace!(target: "platform", "Frame {} ({} fixed step(s))", self.frames, steps);
        self.clock.next_deadline(now)
    }

    /// Dispatches `OnEnable`, followed by `Start` on the first resume.
    fn resume(&mut self) {
        for &event in resume_events(!self.started) {
            self.dispatch(event);
        }
        self.started = true;
    }

    fn request_back(&self) {
        match self.overlays.request_back() {
            Some(top) => debug!(target: "platform", "Back requested for {:?}", top),
            None => debug!(target: "platform", "Back requested with no overlay open"),
        }
    }
}

//=== Winit Integration ===================================================

impl<K: OverlayKey> ApplicationHandler for LifecycleBridge<K> {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        for &event in start_events(cause) {
            self.dispatch(event);
        }
    }

    /// Called on startup and on every mobile resume.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let attrs = WindowAttributes::default()
                .with_title("lifecycle_overlay")
                .with_inner_size(LogicalSize::new(800, 600));

            match event_loop.create_window(attrs) {
                Ok(window) => {
                    info!(
                        target: "platform",
                        "Window created: {}x{} @ {}x DPI",
                        window.inner_size().width,
                        window.inner_size().height,
                        window.scale_factor()
                    );
                    self.window = Some(window);
                }
                Err(e) => {
                    error!(target: "platform", "Window creation failed: {}", e);
                    event_loop.exit();
                    return;
                }
            }
        }

        self.resume();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.dispatch(SUSPENDED);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!(target: "platform", "Window close requested");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput { event: key_event, .. } => {
                if is_back_request(&key_event.logical_key, key_event.state, key_event.repeat) {
                    self.request_back();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let deadline = self.run_frame(Instant::now());
        event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.dispatch(EXITING);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
