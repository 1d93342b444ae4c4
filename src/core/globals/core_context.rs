//=========================================================================
// Core Context
//=========================================================================
//
// Owns the lifecycle router and the overlay manager after the builder
// has wired them together.
//
// Both handles are cheap to clone; callbacks usually capture clones of
// them. The context itself keeps the overlay manager's router hooks so
// they can be detached on teardown.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{info, warn};

//=== Internal Dependencies ===============================================

use crate::core::lifecycle::{
    DispatchReport, LifecycleRouter, ModeSwitch, RuntimeMode, SourceEvent, Subscription,
};
use crate::core::overlay::{OverlayKey, OverlayManager};

//=== CoreContext =========================================================

/// The router and overlay stack, wired together.
///
/// Created by [`CoreBuilder::build`](crate::CoreBuilder::build). Open
/// overlays close automatically on any termination or quit event the
/// router dispatches (subject to the builder's terminate filter).
pub struct CoreContext<K: OverlayKey> {
    /// Lifecycle signal router. Register game callbacks here.
    pub router: LifecycleRouter,

    /// Overlay stack. Register overlay factories here.
    pub overlays: OverlayManager<K>,

    mode_switch: Option<ModeSwitch>,
    hooks: Vec<Subscription>,
    tps: f64,
}

impl<K: OverlayKey> CoreContext<K> {
    pub(crate) fn new(
        router: LifecycleRouter,
        overlays: OverlayManager<K>,
        mode_switch: Option<ModeSwitch>,
        hooks: Vec<Subscription>,
        tps: f64,
    ) -> Self {
        Self {
            router,
            overlays,
            mode_switch,
            hooks,
            tps,
        }
    }

    //--- Initialization ---------------------------------------------------

    /// Runs `init_fn` against the context and returns it, for registering
    /// overlays and callbacks in builder style.
    pub fn init<F>(self, init_fn: F) -> Self
    where
        F: FnOnce(&Self),
    {
        init_fn(&self);
        info!(target: "lifecycle", "Core initialized ({} registration(s))", self.router.len());
        self
    }

    //--- Mode -------------------------------------------------------------

    pub fn mode(&self) -> RuntimeMode {
        self.router.mode()
    }

    /// Switches the runtime mode.
    ///
    /// Only possible when the context was built with an initial mode rather
    /// than an external mode source. Returns `false` otherwise.
    pub fn set_mode(&self, mode: RuntimeMode) -> bool {
        match &self.mode_switch {
            Some(switch) => {
                switch.set(mode);
                true
            }
            None => {
                warn!(target: "lifecycle", "set_mode({:?}) ignored: mode is owned by an external source", mode);
                false
            }
        }
    }

    //--- Dispatch ---------------------------------------------------------

    /// Shorthand for `self.router.dispatch(event)`.
    pub fn dispatch(&self, event: SourceEvent) -> DispatchReport {
        self.router.dispatch(event)
    }

    /// Fixed-step rate used by the platform bridge.
    pub fn tps(&self) -> f64 {
        self.tps
    }

    //--- Teardown ---------------------------------------------------------

    /// Number of router hooks the overlay manager still holds.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Removes the overlay manager's router hooks. Returns how many were
    /// still registered.
    pub fn detach(&mut self) -> usize {
        self.hooks
            .drain(..)
            .map(Subscription::unsubscribe)
            .filter(|&removed| removed)
            .count()
    }

    /// Closes every open overlay without running continuations and detaches
    /// the overlay manager from the router. Returns how many overlays were
    /// closed.
    pub fn teardown(mut self) -> usize {
        let closed = self.overlays.terminate_all();
        let detached = self.detach();
        info!(
            target: "lifecycle",
            "Core torn down ({} overlay(s) closed, {} hook(s) detached)",
            closed, detached
        );
        closed
    }

    //--- Execution --------------------------------------------------------

    /// Drives the router from a winit event loop until the window closes.
    ///
    /// Blocks the calling thread, which must be the main thread on macOS
    /// and iOS. The context remains usable after the loop exits.
    #[cfg(feature = "platform")]
    pub fn run(&self) -> Result<(), crate::platform::PlatformError> {
        crate::platform::run(self)
    }
}

impl<K: OverlayKey> std::fmt::Debug for CoreContext<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("router", &self.router)
            .field("overlays", &self.overlays)
            .field("hooks", &self.hooks.len())
            .field("tps", &self.tps)
            .finish()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifecycle::ContextFilter;
    use crate::core::overlay::{OpenRequest, Overlay, OverlayText};
    use crate::CoreBuilder;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestOverlay {
        Pause,
    }

    impl OverlayKey for TestOverlay {}

    struct PauseMenu;

    impl Overlay for PauseMenu {
        fn apply_text(&mut self, _text: &OverlayText) {}
    }

    fn context() -> CoreContext<TestOverlay> {
        crate::test_support::init_logging();
        CoreBuilder::new().build().init(|core| {
            core.overlays
                .register(TestOverlay::Pause, OverlayText::new("Paused", "Resume", "Quit"), || PauseMenu);
        })
    }

    #[test]
    fn quit_event_closes_overlays() {
        let core = context();
        core.overlays.open(TestOverlay::Pause, OpenRequest::new()).unwrap();

        let report = core.dispatch(SourceEvent::EditorQuitting);

        assert_eq!(report.invoked, 1);
        assert!(!core.overlays.is_open(TestOverlay::Pause));
    }

    #[test]
    fn set_mode_drives_router_filters() {
        let core = context();
        let count = Rc::new(Cell::new(0));
        let observed = Rc::clone(&count);
        core.router.register_fn(
            move || observed.set(observed.get() + 1),
            ContextFilter::EDIT_MODE_ONLY,
            SourceEvent::Update,
        );

        assert_eq!(core.mode(), RuntimeMode::Playing);
        core.dispatch(SourceEvent::Update);
        assert!(core.set_mode(RuntimeMode::Editing));
        core.dispatch(SourceEvent::Update);

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn external_mode_source_cannot_be_overridden() {
        crate::test_support::init_logging();
        let core = CoreBuilder::<TestOverlay>::new()
            .with_mode_source(|| RuntimeMode::Editing)
            .build();

        assert!(!core.set_mode(RuntimeMode::Playing));
        assert_eq!(core.mode(), RuntimeMode::Editing);
    }

    #[test]
    fn detach_removes_overlay_hooks() {
        let mut core = context();
        let hooks = core.hook_count();
        assert!(hooks > 0);
        assert_eq!(core.router.len(), hooks);

        assert_eq!(core.detach(), hooks);
        assert!(core.router.is_empty());

        core.overlays.open(TestOverlay::Pause, OpenRequest::new()).unwrap();
        core.dispatch(SourceEvent::OnDisable);
        assert!(core.overlays.is_open(TestOverlay::Pause));
    }

    #[test]
    fn teardown_closes_and_detaches() {
        let core = context();
        let router = core.router.clone();
        let overlays = core.overlays.clone();
        overlays.open(TestOverlay::Pause, OpenRequest::new()).unwrap();

        assert_eq!(core.teardown(), 1);

        assert!(overlays.open_overlays().is_empty());
        assert!(router.is_empty());
    }
}
