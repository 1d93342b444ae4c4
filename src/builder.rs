//=========================================================================
// Core Builder
//
// Entry point for wiring the lifecycle router and overlay stack.
//
// Architecture:
// ```text
//     CoreBuilder  ──build()──>  CoreContext  ──run()──>  [winit loop]
//         │                          │
//         ├─ with_initial_mode()     ├─ router
//         ├─ with_mode_source()      └─ overlays (attached to router)
//         ├─ with_tps()
//         └─ with_terminate_filter()
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::marker::PhantomData;

use log::info;

//=== Internal Dependencies ===============================================

use crate::core::globals::CoreContext;
use crate::core::lifecycle::{ContextFilter, LifecycleRouter, ModeSource, ModeSwitch, RuntimeMode};
use crate::core::overlay::{OverlayKey, OverlayManager};

//=== ModeConfig ==========================================================

enum ModeConfig {
    /// Crate-owned switch, settable through `CoreContext::set_mode`.
    Switch(RuntimeMode),
    /// Host-owned source.
    Source(Box<dyn ModeSource>),
}

//=== CoreBuilder =========================================================

/// Builder for configuring and constructing a [`CoreContext`].
///
/// # Default Values
///
/// - **Initial mode**: [`RuntimeMode::Playing`]
/// - **TPS**: 60.0 (fixed-step rate of the platform bridge)
/// - **Terminate filter**: [`ContextFilter::ALWAYS`]
///
/// # Examples
///
/// ```
/// use lifecycle_overlay::prelude::*;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Menu { Pause }
/// impl OverlayKey for Menu {}
///
/// let core = CoreBuilder::<Menu>::new()
///     .with_initial_mode(RuntimeMode::Editing)
///     .with_terminate_filter(ContextFilter::PLAY_MODE_ONLY)
///     .with_tps(30.0)
///     .build();
///
/// assert_eq!(core.mode(), RuntimeMode::Editing);
/// ```
pub struct CoreBuilder<K: OverlayKey> {
    mode: ModeConfig,
    tps: f64,
    terminate_filter: ContextFilter,
    _phantom: PhantomData<K>,
}

impl<K: OverlayKey> CoreBuilder<K> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            mode: ModeConfig::Switch(RuntimeMode::default()),
            tps: 60.0,
            terminate_filter: ContextFilter::ALWAYS,
            _phantom: PhantomData,
        }
    }

    /// Starts in `mode`, switchable later via [`CoreContext::set_mode`].
    ///
    /// Replaces any source set with [`with_mode_source`](Self::with_mode_source).
    pub fn with_initial_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = ModeConfig::Switch(mode);
        self
    }

    /// Reads the runtime mode from `source` on every dispatch.
    ///
    /// Replaces any mode set with [`with_initial_mode`](Self::with_initial_mode).
    pub fn with_mode_source<M>(mut self, source: M) -> Self
    where
        M: ModeSource + 'static,
    {
        self.mode = ModeConfig::Source(Box::new(source));
        self
    }

    /// Sets the fixed-step rate at which the platform bridge dispatches
    /// `FixedUpdate`.
    ///
    /// Default: 60.0
    ///
    /// # Panics
    ///
    /// Panics if `tps <= 0.0`.
    pub fn with_tps(mut self, tps: f64) -> Self {
        assert!(tps > 0.0, "TPS must be positive, got {}", tps);
        self.tps = tps;
        self
    }

    /// Selects the modes in which the overlay manager's terminate and
    /// initialize hooks are active.
    ///
    /// Default: [`ContextFilter::ALWAYS`]
    ///
    /// # Panics
    ///
    /// Panics if `filter` is empty, since the hooks could never fire.
    pub fn with_terminate_filter(mut self, filter: ContextFilter) -> Self {
        assert!(!filter.is_empty(), "Terminate filter must include at least one mode");
        self.terminate_filter = filter;
        self
    }

    /// Builds the router, the overlay manager, and attaches one to the other.
    pub fn build(self) -> CoreContext<K> {
        let (router, mode_switch) = match self.mode {
            ModeConfig::Switch(initial) => {
                let switch = ModeSwitch::new(initial);
                (LifecycleRouter::new(switch.clone()), Some(switch))
            }
            ModeConfig::Source(source) => (LifecycleRouter::with_boxed_source(source), None),
        };

        let overlays = OverlayManager::new();
        let hooks = overlays.attach(&router, self.terminate_filter);

        info!(
            target: "lifecycle",
            "Building core (mode: {:?}, TPS: {}, terminate filter: {:?})",
            router.mode(),
            self.tps,
            self.terminate_filter
        );

        CoreContext::new(router, overlays, mode_switch, hooks, self.tps)
    }
}

impl<K: OverlayKey> Default for CoreBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
