//=========================================================================
// Overlay Manager
//=========================================================================
//
// Owns one slot per overlay key and the shared stack of open overlays.
//
// Each slot holds the key's factory and default text, its lifecycle
// state, the live instance while active, and the pending confirm/cancel
// continuations. Continuations run only after the slot is back to
// `Closed` and no internal borrow is held, so they may freely open or
// close overlays, including their own.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crossbeam_channel::Receiver;
use log::{debug, error, trace, warn};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::broadcast::{Broadcaster, OverlayEvent};
use super::request::{Continuation, OpenRequest};
use super::{Overlay, OverlayKey, OverlayText};
use crate::core::lifecycle::{
    panic_message, ContextFilter, InvocationOrigin, LifecycleAction, LifecycleRouter, SourceEvent,
    Subscription,
};

//=== Public Types ========================================================

/// Lifecycle state of a single overlay key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverlayState {
    #[default]
    Closed,
    Active,
    /// Teardown in progress; the overlay has already left the stack.
    Closing,
}

/// What [`OverlayManager::open`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new instance was constructed and pushed onto the stack.
    Opened,
    /// The overlay was already active; its text (and any supplied
    /// continuations) were updated in place.
    Refreshed,
}

/// Overlay configuration and usage errors.
///
/// None of these are fatal; the failing call simply has no effect.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OverlayError<K: OverlayKey> {
    #[error("overlay {0:?} has no registered factory")]
    MissingFactory(K),

    #[error("overlay {0:?} is still closing")]
    Closing(K),

    #[error("overlay manager re-entered from a presentation hook while opening {0:?}")]
    Reentrant(K),

    #[error("overlay {0:?} panicked while being presented")]
    Presentation(K),
}

//=== Internal State ======================================================

type OverlayFactory = Box<dyn Fn() -> Box<dyn Overlay>>;

struct OverlaySlot {
    defaults: OverlayText,
    factory: OverlayFactory,
    state: OverlayState,
    instance: Option<Box<dyn Overlay>>,
    text: Option<OverlayText>,
    on_confirm: Option<Continuation>,
    on_cancel: Option<Continuation>,
}

impl OverlaySlot {
    fn new(defaults: OverlayText, factory: OverlayFactory) -> Self {
        Self {
            defaults,
            factory,
            state: OverlayState::Closed,
            instance: None,
            text: None,
            on_confirm: None,
            on_cancel: None,
        }
    }
}

struct StackState<K: OverlayKey> {
    slots: HashMap<K, OverlaySlot>,
    stack: Vec<K>,
}

struct ManagerInner<K: OverlayKey> {
    state: RefCell<StackState<K>>,
    broadcaster: RefCell<Broadcaster<K>>,
    back_handler: RefCell<Option<Rc<dyn Fn()>>>,
}

type Continuations = (Option<Continuation>, Option<Continuation>);

//=== OverlayManager ======================================================

/// Enforces at most one live instance per overlay key and tracks open order.
///
/// Cheap to clone; clones share the same slots and stack. Not thread-safe:
/// every call must come from the main loop's thread.
///
/// # Example
///
/// ```rust
/// # use lifecycle_overlay::prelude::*;
/// # use std::rc::Rc;
/// # use std::cell::Cell;
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Menu { Reward }
/// impl OverlayKey for Menu {}
///
/// struct RewardDialog;
/// impl Overlay for RewardDialog {
///     fn apply_text(&mut self, _text: &OverlayText) {}
/// }
///
/// let overlays = OverlayManager::new();
/// overlays.register(Menu::Reward, OverlayText::new("Watch an ad?", "Watch", "Skip"), || RewardDialog);
///
/// let granted = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&granted);
/// overlays
///     .open(Menu::Reward, OpenRequest::new().on_confirm(move || flag.set(true)))
///     .unwrap();
///
/// overlays.confirm(Menu::Reward);
/// assert!(granted.get());
/// assert!(!overlays.is_open(Menu::Reward));
/// ```
pub struct OverlayManager<K: OverlayKey> {
    inner: Rc<ManagerInner<K>>,
}

impl<K: OverlayKey> OverlayManager<K> {
    //--- Construction -----------------------------------------------------

    /// Creates a manager with no registered overlays and an empty stack.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                state: RefCell::new(StackState {
                    slots: HashMap::new(),
                    stack: Vec::new(),
                }),
                broadcaster: RefCell::new(Broadcaster::new()),
                back_handler: RefCell::new(None),
            }),
        }
    }

    //--- Registration -----------------------------------------------------

    /// Registers the factory and default text for `key`.
    ///
    /// The factory runs lazily on each closed → active transition.
    /// Registering a key twice replaces its factory and defaults; a live
    /// instance is kept until it closes.
    pub fn register<F, O>(&self, key: K, defaults: OverlayText, factory: F)
    where
        F: Fn() -> O + 'static,
        O: Overlay + 'static,
    {
        let factory: OverlayFactory = Box::new(move || -> Box<dyn Overlay> { Box::new(factory()) });

        let Some(mut state) = self.state_mut("register") else {
            return;
        };

        match state.slots.get_mut(&key) {
            Some(slot) => {
                warn!(target: "overlay", "Overlay {:?} was already registered and has been replaced", key);
                slot.factory = factory;
                slot.defaults = defaults;
            }
            None => {
                debug!(target: "overlay", "Registered overlay {:?}", key);
                state.slots.insert(key, OverlaySlot::new(defaults, factory));
            }
        }
    }

    /// Checks that every key in `keys` has a registered factory.
    ///
    /// Intended for startup, so missing factories surface before the first
    /// `open`. Every missing key is logged; the first one is returned.
    pub fn validate(&self, keys: &[K]) -> Result<(), OverlayError<K>> {
        let missing: Vec<K> = self
            .with_state(|state| {
                keys.iter()
                    .copied()
                    .filter(|key| !state.slots.contains_key(key))
                    .collect()
            })
            .unwrap_or_default();

        for key in &missing {
            error!(target: "overlay", "Overlay {:?} has no registered factory", key);
        }

        match missing.first() {
            Some(&key) => Err(OverlayError::MissingFactory(key)),
            None => Ok(()),
        }
    }

    //--- Open -------------------------------------------------------------

    /// Opens `key`, or refreshes it if it is already active.
    ///
    /// On a closed overlay this constructs the instance, applies the text,
    /// stores the continuations, pushes the key and broadcasts
    /// [`OverlayEvent::Opened`], in that order. On an active overlay the
    /// text is re-applied and continuations supplied by `request` replace
    /// the stored ones; nothing is pushed or broadcast.
    ///
    /// A panic in the factory, `apply_text` or `on_open` is caught and
    /// reported as [`OverlayError::Presentation`]; the request's
    /// continuations are dropped unrun.
    pub fn open(&self, key: K, request: OpenRequest) -> Result<OpenOutcome, OverlayError<K>> {
        let mut state = self.inner.state.try_borrow_mut().map_err(|_| {
            error!(target: "overlay", "open({:?}) called from inside a presentation hook", key);
            OverlayError::Reentrant(key)
        })?;
        let StackState { slots, stack } = &mut *state;

        let Some(slot) = slots.get_mut(&key) else {
            error!(target: "overlay", "Cannot open {:?}: no factory registered", key);
            return Err(OverlayError::MissingFactory(key));
        };

        let OpenRequest {
            config,
            on_confirm,
            on_cancel,
        } = request;
        let text = config.unwrap_or_default().resolve(&slot.defaults);

        let current = slot.state;
        let presented = match current {
            OverlayState::Closing => {
                warn!(target: "overlay", "Cannot open {:?} while it is closing", key);
                drop(state);
                drop((on_confirm, on_cancel));
                return Err(OverlayError::Closing(key));
            }
            OverlayState::Closed => panic::catch_unwind(AssertUnwindSafe(|| {
                let mut instance = (slot.factory)();
                instance.apply_text(&text);
                instance.on_open();
                slot.instance = Some(instance);
                slot.state = OverlayState::Active;
                OpenOutcome::Opened
            })),
            OverlayState::Active => panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(instance) = slot.instance.as_mut() {
                    instance.apply_text(&text);
                }
                OpenOutcome::Refreshed
            })),
        };

        // A failed construction leaves the slot closed; a failed refresh
        // leaves it active with its previous text and continuations
        let outcome = match presented {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    target: "overlay",
                    "Presenting {:?} panicked during open: {}",
                    key,
                    panic_message(payload.as_ref())
                );
                drop(state);
                drop((on_confirm, on_cancel));
                return Err(OverlayError::Presentation(key));
            }
        };

        slot.text = Some(text);

        // Replaced continuations are dropped after the borrow is released
        let mut discarded = Vec::new();
        if let Some(continuation) = on_confirm {
            discarded.extend(slot.on_confirm.replace(continuation));
        }
        if let Some(continuation) = on_cancel {
            discarded.extend(slot.on_cancel.replace(continuation));
        }

        if !stack.contains(&key) {
            stack.push(key);
        }

        match outcome {
            OpenOutcome::Opened => {
                debug!(target: "overlay", "Opened overlay {:?} (stack depth {})", key, stack.len());
                self.inner.broadcaster.borrow_mut().send(OverlayEvent::Opened(key));
            }
            OpenOutcome::Refreshed => {
                trace!(target: "overlay", "Overlay {:?} already active, refreshed", key);
            }
        }

        drop(state);
        drop(discarded);
        Ok(outcome)
    }

    //--- Close ------------------------------------------------------------

    /// Closes `key` without running either continuation.
    ///
    /// Both stored continuations are dropped. Returns `false` (and does
    /// nothing) if the overlay was not active.
    pub fn close(&self, key: K) -> bool {
        self.teardown(key, "close").is_some()
    }

    /// Closes `key`, then runs its confirm continuation if one was stored.
    ///
    /// The cancel continuation is dropped unrun. Returns `false` if the
    /// overlay was not active.
    pub fn confirm(&self, key: K) -> bool {
        let Some((on_confirm, on_cancel)) = self.teardown(key, "confirm") else {
            return false;
        };
        drop(on_cancel);

        if let Some(continuation) = on_confirm {
            run_continuation(key, "confirm", continuation);
        }
        true
    }

    /// Closes `key`, then runs its cancel continuation if one was stored.
    ///
    /// The confirm continuation is dropped unrun. Returns `false` if the
    /// overlay was not active.
    pub fn cancel(&self, key: K) -> bool {
        let Some((on_confirm, on_cancel)) = self.teardown(key, "cancel") else {
            return false;
        };
        drop(on_confirm);

        if let Some(continuation) = on_cancel {
            run_continuation(key, "cancel", continuation);
        }
        true
    }

    /// Closes every open overlay, topmost first, without running any
    /// continuations. Returns how many overlays were closed.
    pub fn terminate_all(&self) -> usize {
        let open: Vec<K> = self.open_overlays();
        let closed = open.iter().rev().filter(|&&key| self.close(key)).count();

        if closed > 0 {
            debug!(target: "overlay", "Terminated {} open overlay(s)", closed);
        }
        closed
    }

    //--- Back Navigation --------------------------------------------------

    /// Broadcasts [`OverlayEvent::BackRequested`] naming the topmost overlay.
    ///
    /// The manager does not decide how the overlay reacts. When nothing is
    /// open, the default back handler (if any) runs instead. Returns the
    /// topmost overlay at the time of the request.
    pub fn request_back(&self) -> Option<K> {
        let top = self.top();
        self.inner
            .broadcaster
            .borrow_mut()
            .send(OverlayEvent::BackRequested { top });

        if top.is_none() {
            let handler = self.inner.back_handler.borrow().clone();
            if let Some(handler) = handler {
                trace!(target: "overlay", "Back requested with empty stack, running default handler");
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler())) {
                    error!(
                        target: "overlay",
                        "Default back handler panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        top
    }

    /// Sets the handler run by [`request_back`](Self::request_back) when no
    /// overlay is open.
    pub fn set_back_handler<F>(&self, handler: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.back_handler.borrow_mut() = Some(Rc::new(handler));
    }

    //--- Broadcasts -------------------------------------------------------

    /// Returns a receiver for all future overlay events.
    pub fn subscribe(&self) -> Receiver<OverlayEvent<K>> {
        self.inner.broadcaster.borrow_mut().subscribe()
    }

    //--- Lifecycle Hooks --------------------------------------------------

    /// Hooks this manager into `router`.
    ///
    /// Every source event with a termination or quit origin closes all
    /// open overlays; every initialization event logs the registered set.
    /// The router only holds a weak reference to the manager. Once the
    /// manager is dropped, the first hook that fires unregisters them all.
    pub fn attach(&self, router: &LifecycleRouter, filter: ContextFilter) -> Vec<Subscription> {
        let hooks: Rc<RefCell<Vec<Subscription>>> = Rc::default();

        let terminate = Self::hook(&self.inner, &hooks, |manager| {
            manager.terminate_all();
        });
        let initialize = Self::hook(&self.inner, &hooks, |manager| {
            manager.initialize();
        });

        let subscriptions: Vec<Subscription> = SourceEvent::ALL
            .into_iter()
            .filter_map(|event| match event.origin() {
                InvocationOrigin::Termination | InvocationOrigin::ApplicationQuit => {
                    Some(router.register(Rc::clone(&terminate), filter, event))
                }
                InvocationOrigin::Initialization => {
                    Some(router.register(Rc::clone(&initialize), filter, event))
                }
                _ => None,
            })
            .collect();

        hooks.borrow_mut().extend(subscriptions.iter().cloned());
        subscriptions
    }

    /// Wraps `action` so it runs against the manager while it is alive and
    /// unregisters every hook in `hooks` once it is gone.
    fn hook(
        inner: &Rc<ManagerInner<K>>,
        hooks: &Rc<RefCell<Vec<Subscription>>>,
        action: impl Fn(OverlayManager<K>) + 'static,
    ) -> LifecycleAction {
        let weak = Rc::downgrade(inner);
        let hooks = Rc::clone(hooks);
        Rc::new(move || match weak.upgrade() {
            Some(inner) => action(OverlayManager { inner }),
            None => {
                let stale: Vec<Subscription> = hooks.borrow_mut().drain(..).collect();
                trace!(target: "overlay", "Overlay manager dropped, removing {} router hook(s)", stale.len());
                for subscription in stale {
                    subscription.unsubscribe();
                }
            }
        })
    }

    /// Logs the registered overlay set and returns its size.
    pub fn initialize(&self) -> usize {
        let registered = self.with_state(|state| state.slots.len()).unwrap_or(0);
        debug!(target: "overlay", "Overlay manager initialized with {} overlay type(s)", registered);
        registered
    }

    //--- Query API --------------------------------------------------------

    /// Current state of `key`, or `None` if it was never registered.
    pub fn state(&self, key: K) -> Option<OverlayState> {
        self.with_state(|state| state.slots.get(&key).map(|slot| slot.state))
            .flatten()
    }

    pub fn is_open(&self, key: K) -> bool {
        self.state(key) == Some(OverlayState::Active)
    }

    pub fn is_registered(&self, key: K) -> bool {
        self.with_state(|state| state.slots.contains_key(&key))
            .unwrap_or(false)
    }

    /// The text currently applied to `key`, while it is active.
    pub fn text(&self, key: K) -> Option<OverlayText> {
        self.with_state(|state| state.slots.get(&key).and_then(|slot| slot.text.clone()))
            .flatten()
    }

    /// The most recently opened overlay still on the stack.
    pub fn top(&self) -> Option<K> {
        self.with_state(|state| state.stack.last().copied()).flatten()
    }

    /// Open overlays, oldest first.
    pub fn open_overlays(&self) -> Vec<K> {
        self.with_state(|state| state.stack.clone())
            .unwrap_or_default()
    }

    //--- Internal Helpers -------------------------------------------------

    /// Active → Closing → Closed, returning the stored continuations.
    ///
    /// The instance's `on_close` hook runs between the two borrows, while
    /// the slot is `Closing` and the key is already off the stack.
    fn teardown(&self, key: K, op: &str) -> Option<Continuations> {
        //--- Phase 1: leave the stack -------------------------------------
        let (instance, continuations, emptied) = {
            let mut state = self.state_mut(op)?;
            let StackState { slots, stack } = &mut *state;

            let Some(slot) = slots.get_mut(&key) else {
                debug!(target: "overlay", "{}({:?}) on unregistered overlay, ignoring", op, key);
                return None;
            };

            if slot.state != OverlayState::Active {
                trace!(target: "overlay", "{}({:?}) while {:?}, ignoring", op, key, slot.state);
                return None;
            }

            slot.state = OverlayState::Closing;
            slot.text = None;

            let was_open = !stack.is_empty();
            stack.retain(|&k| k != key);

            (
                slot.instance.take(),
                (slot.on_confirm.take(), slot.on_cancel.take()),
                was_open && stack.is_empty(),
            )
        };

        //--- Phase 2: tear down the instance ------------------------------
        if let Some(mut instance) = instance {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| instance.on_close())) {
                error!(
                    target: "overlay",
                    "on_close for {:?} panicked: {}",
                    key,
                    panic_message(payload.as_ref())
                );
            }
        }

        //--- Phase 3: settle ----------------------------------------------
        let mut state = self.inner.state.borrow_mut();
        if let Some(slot) = state.slots.get_mut(&key) {
            slot.state = OverlayState::Closed;
        }
        debug!(target: "overlay", "Closed overlay {:?} via {}", key, op);

        // A teardown hook may have opened something in the meantime
        if emptied && state.stack.is_empty() {
            debug!(target: "overlay", "All overlays closed");
            self.inner.broadcaster.borrow_mut().send(OverlayEvent::AllClosed);
        }

        Some(continuations)
    }

    fn state_mut(&self, op: &str) -> Option<RefMut<'_, StackState<K>>> {
        match self.inner.state.try_borrow_mut() {
            Ok(state) => Some(state),
            Err(_) => {
                error!(target: "overlay", "{} called from inside a presentation hook, ignoring", op);
                None
            }
        }
    }

    fn with_state<R>(&self, read: impl FnOnce(&StackState<K>) -> R) -> Option<R> {
        match self.inner.state.try_borrow() {
            Ok(state) => Some(read(&state)),
            Err(_) => {
                error!(target: "overlay", "Overlay state queried from inside a presentation hook");
                None
            }
        }
    }
}

impl<K: OverlayKey> Clone for OverlayManager<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: OverlayKey> Default for OverlayManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: OverlayKey> fmt::Debug for OverlayManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayManager")
            .field("open", &self.open_overlays())
            .finish_non_exhaustive()
    }
}

fn run_continuation<K: OverlayKey>(key: K, op: &str, continuation: Continuation) {
    trace!(target: "overlay", "Running {} continuation for {:?}", op, key);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| continuation.run())) {
        error!(
            target: "overlay",
            "{} continuation for {:?} panicked: {}",
            op,
            key,
            panic_message(payload.as_ref())
        );
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifecycle::{ModeSwitch, RuntimeMode};
    use crate::core::overlay::OverlayConfig;
    use std::cell::Cell;

    //--- Test Fixtures ----------------------------------------------------

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestOverlay {
        Reward,
        Confirm,
        Settings,
        Unregistered,
    }

    impl OverlayKey for TestOverlay {}

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Dialog {
        name: &'static str,
        journal: Journal,
    }

    impl Overlay for Dialog {
        fn apply_text(&mut self, text: &OverlayText) {
            self.journal
                .borrow_mut()
                .push(format!("{}:text:{}", self.name, text.label));
        }

        fn on_open(&mut self) {
            self.journal.borrow_mut().push(format!("{}:open", self.name));
        }

        fn on_close(&mut self) {
            self.journal.borrow_mut().push(format!("{}:close", self.name));
        }
    }

    fn register_dialog(
        manager: &OverlayManager<TestOverlay>,
        key: TestOverlay,
        name: &'static str,
        defaults: OverlayText,
        journal: &Journal,
    ) -> Rc<Cell<u32>> {
        let built = Rc::new(Cell::new(0));
        let counter = Rc::clone(&built);
        let journal = Rc::clone(journal);
        manager.register(key, defaults, move || {
            counter.set(counter.get() + 1);
            Dialog {
                name,
                journal: Rc::clone(&journal),
            }
        });
        built
    }

    struct Fixture {
        manager: OverlayManager<TestOverlay>,
        journal: Journal,
        reward_builds: Rc<Cell<u32>>,
    }

    fn fixture() -> Fixture {
        crate::test_support::init_logging();
        let manager = OverlayManager::new();
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));

        let reward_builds = register_dialog(
            &manager,
            TestOverlay::Reward,
            "reward",
            OverlayText::new("Watch an ad?", "Watch", "No thanks"),
            &journal,
        );
        register_dialog(
            &manager,
            TestOverlay::Confirm,
            "confirm",
            OverlayText::new("Are you sure?", "Yes", "No"),
            &journal,
        );
        register_dialog(
            &manager,
            TestOverlay::Settings,
            "settings",
            OverlayText::new("Settings", "Save", "Close"),
            &journal,
        );

        Fixture {
            manager,
            journal,
            reward_builds,
        }
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let observed = Rc::clone(&count);
        (count, move || observed.set(observed.get() + 1))
    }

    //--- Open -------------------------------------------------------------

    #[test]
    fn open_activates_and_pushes() {
        let f = fixture();
        let outcome = f.manager.open(TestOverlay::Reward, OpenRequest::new());

        assert_eq!(outcome, Ok(OpenOutcome::Opened));
        assert_eq!(f.manager.state(TestOverlay::Reward), Some(OverlayState::Active));
        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Reward]);
        assert_eq!(
            *f.journal.borrow(),
            vec!["reward:text:Watch an ad?".to_string(), "reward:open".to_string()]
        );
    }

    #[test]
    fn double_open_keeps_single_entry_and_single_broadcast() {
        let f = fixture();
        let events = f.manager.subscribe();

        assert_eq!(f.manager.open(TestOverlay::Confirm, OpenRequest::new()), Ok(OpenOutcome::Opened));
        assert_eq!(
            f.manager.open(TestOverlay::Confirm, OpenRequest::new()),
            Ok(OpenOutcome::Refreshed)
        );

        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Confirm]);
        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received, vec![OverlayEvent::Opened(TestOverlay::Confirm)]);
    }

    #[test]
    fn reopen_reapplies_text_without_reconstruction() {
        let f = fixture();
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager
            .open(TestOverlay::Reward, OverlayConfig::new().label("Double coins").into())
            .unwrap();

        assert_eq!(f.reward_builds.get(), 1);
        assert_eq!(f.manager.text(TestOverlay::Reward).unwrap().label, "Double coins");
        assert_eq!(
            f.journal.borrow().last().map(String::as_str),
            Some("reward:text:Double coins")
        );
    }

    #[test]
    fn reopen_after_close_constructs_fresh_instance() {
        let f = fixture();
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.close(TestOverlay::Reward);
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();

        assert_eq!(f.reward_builds.get(), 2);
    }

    #[test]
    fn open_unregistered_reports_missing_factory() {
        let f = fixture();
        assert_eq!(
            f.manager.open(TestOverlay::Unregistered, OpenRequest::new()),
            Err(OverlayError::MissingFactory(TestOverlay::Unregistered))
        );
        assert!(f.manager.open_overlays().is_empty());
        assert_eq!(f.manager.state(TestOverlay::Unregistered), None);
    }

    #[test]
    fn missing_config_uses_per_type_defaults() {
        let f = fixture();
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();

        assert_eq!(
            f.manager.text(TestOverlay::Reward),
            Some(OverlayText::new("Watch an ad?", "Watch", "No thanks"))
        );
        assert_eq!(
            f.manager.text(TestOverlay::Confirm),
            Some(OverlayText::new("Are you sure?", "Yes", "No"))
        );
    }

    #[test]
    fn partial_config_falls_back_per_field() {
        let f = fixture();
        f.manager
            .open(TestOverlay::Reward, OverlayConfig::new().confirm("Sure").into())
            .unwrap();

        assert_eq!(
            f.manager.text(TestOverlay::Reward),
            Some(OverlayText::new("Watch an ad?", "Sure", "No thanks"))
        );
    }

    #[test]
    fn refresh_keeps_continuations_unless_supplied() {
        let f = fixture();
        let (first, first_action) = counter();
        let (second, second_action) = counter();

        f.manager
            .open(TestOverlay::Reward, OpenRequest::new().on_confirm(first_action))
            .unwrap();
        // No continuations supplied: the stored one survives
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.confirm(TestOverlay::Reward);
        assert_eq!(first.get(), 1);

        let (stale, stale_action) = counter();
        f.manager
            .open(TestOverlay::Reward, OpenRequest::new().on_confirm(stale_action))
            .unwrap();
        f.manager
            .open(TestOverlay::Reward, OpenRequest::new().on_confirm(second_action))
            .unwrap();
        f.manager.confirm(TestOverlay::Reward);

        assert_eq!(stale.get(), 0);
        assert_eq!(second.get(), 1);
    }

    //--- Close ------------------------------------------------------------

    #[test]
    fn close_clears_continuations_even_if_uninvoked() {
        let f = fixture();
        let token = Rc::new(());
        let (confirm_token, cancel_token) = (Rc::clone(&token), Rc::clone(&token));

        f.manager
            .open(
                TestOverlay::Reward,
                OpenRequest::new()
                    .on_confirm(move || drop(confirm_token))
                    .on_cancel(move || drop(cancel_token)),
            )
            .unwrap();
        assert_eq!(Rc::strong_count(&token), 3);

        assert!(f.manager.close(TestOverlay::Reward));

        assert_eq!(Rc::strong_count(&token), 1);
        assert_eq!(f.manager.state(TestOverlay::Reward), Some(OverlayState::Closed));
        assert!(f.manager.open_overlays().is_empty());
        assert_eq!(f.manager.text(TestOverlay::Reward), None);
        assert_eq!(f.journal.borrow().last().map(String::as_str), Some("reward:close"));
    }

    #[test]
    fn close_family_on_closed_overlay_is_noop() {
        let f = fixture();
        let events = f.manager.subscribe();

        assert!(!f.manager.close(TestOverlay::Reward));
        assert!(!f.manager.confirm(TestOverlay::Reward));
        assert!(!f.manager.cancel(TestOverlay::Reward));
        assert!(!f.manager.close(TestOverlay::Unregistered));

        assert!(events.try_recv().is_err());
        assert!(f.journal.borrow().is_empty());
    }

    #[test]
    fn stack_removal_preserves_order_of_others() {
        let f = fixture();
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();
        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();

        f.manager.close(TestOverlay::Confirm);

        assert_eq!(
            f.manager.open_overlays(),
            vec![TestOverlay::Reward, TestOverlay::Settings]
        );
        assert_eq!(f.manager.top(), Some(TestOverlay::Settings));
    }

    #[test]
    fn all_closed_fires_once_per_transition_to_empty() {
        let f = fixture();
        let events = f.manager.subscribe();

        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();
        f.manager.close(TestOverlay::Confirm);
        f.manager.close(TestOverlay::Reward);
        f.manager.close(TestOverlay::Reward);

        let all_closed = events
            .try_iter()
            .filter(|event| *event == OverlayEvent::AllClosed)
            .count();
        assert_eq!(all_closed, 1);
    }

    //--- Confirm / Cancel -------------------------------------------------

    #[test]
    fn reward_confirm_scenario() {
        let f = fixture();
        let (a, on_confirm) = counter();
        let (b, on_cancel) = counter();

        f.manager
            .open(
                TestOverlay::Reward,
                OpenRequest::new()
                    .with_config(OverlayConfig::new().label("Offer").confirm("Yes").cancel("No"))
                    .on_confirm(on_confirm)
                    .on_cancel(on_cancel),
            )
            .unwrap();
        assert_eq!(
            f.manager.text(TestOverlay::Reward),
            Some(OverlayText::new("Offer", "Yes", "No"))
        );

        assert!(f.manager.confirm(TestOverlay::Reward));

        assert_eq!(f.manager.state(TestOverlay::Reward), Some(OverlayState::Closed));
        assert!(!f.manager.open_overlays().contains(&TestOverlay::Reward));
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 0);

        // Continuations were consumed
        assert!(!f.manager.confirm(TestOverlay::Reward));
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn cancel_runs_only_on_cancel() {
        let f = fixture();
        let (a, on_confirm) = counter();
        let (b, on_cancel) = counter();

        f.manager
            .open(
                TestOverlay::Confirm,
                OpenRequest::new().on_confirm(on_confirm).on_cancel(on_cancel),
            )
            .unwrap();
        assert!(f.manager.cancel(TestOverlay::Confirm));

        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn confirm_without_continuation_still_closes() {
        let f = fixture();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();
        assert!(f.manager.confirm(TestOverlay::Confirm));
        assert!(!f.manager.is_open(TestOverlay::Confirm));
    }

    #[test]
    fn continuation_runs_after_overlay_is_closed() {
        let f = fixture();
        let observed = Rc::new(Cell::new(None));
        let shared = Rc::clone(&observed);
        let handle = f.manager.clone();

        f.manager
            .open(
                TestOverlay::Reward,
                OpenRequest::new().on_confirm(move || {
                    shared.set(Some((
                        handle.state(TestOverlay::Reward),
                        handle.open_overlays().contains(&TestOverlay::Reward),
                    )));
                }),
            )
            .unwrap();
        f.manager.confirm(TestOverlay::Reward);

        assert_eq!(observed.get(), Some((Some(OverlayState::Closed), false)));
    }

    #[test]
    fn continuation_may_reopen_its_own_overlay() {
        let f = fixture();
        let events = f.manager.subscribe();
        let handle = f.manager.clone();
        let (second, second_action) = counter();
        let reopened = Rc::new(Cell::new(None));
        let outcome = Rc::clone(&reopened);

        f.manager
            .open(
                TestOverlay::Reward,
                OpenRequest::new().on_confirm(move || {
                    outcome.set(Some(handle.open(
                        TestOverlay::Reward,
                        OpenRequest::new()
                            .with_config(OverlayConfig::new().label("Again?"))
                            .on_confirm(second_action),
                    )));
                }),
            )
            .unwrap();
        f.manager.confirm(TestOverlay::Reward);

        assert_eq!(reopened.get(), Some(Ok(OpenOutcome::Opened)));
        assert!(f.manager.is_open(TestOverlay::Reward));
        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Reward]);
        assert_eq!(f.manager.text(TestOverlay::Reward).unwrap().label, "Again?");
        assert_eq!(f.reward_builds.get(), 2);

        f.manager.confirm(TestOverlay::Reward);
        assert_eq!(second.get(), 1);

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                OverlayEvent::Opened(TestOverlay::Reward),
                OverlayEvent::AllClosed,
                OverlayEvent::Opened(TestOverlay::Reward),
                OverlayEvent::AllClosed,
            ]
        );
    }

    #[test]
    fn continuation_may_open_another_overlay() {
        let f = fixture();
        let handle = f.manager.clone();

        f.manager
            .open(
                TestOverlay::Reward,
                OpenRequest::new().on_cancel(move || {
                    handle.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();
                }),
            )
            .unwrap();
        f.manager.cancel(TestOverlay::Reward);

        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Confirm]);
    }

    #[test]
    fn panicking_continuation_is_contained() {
        let f = fixture();
        f.manager
            .open(TestOverlay::Reward, OpenRequest::new().on_confirm(|| panic!("ad sdk exploded")))
            .unwrap();

        assert!(f.manager.confirm(TestOverlay::Reward));
        assert_eq!(f.manager.state(TestOverlay::Reward), Some(OverlayState::Closed));

        // The manager is still usable afterwards
        assert_eq!(f.manager.open(TestOverlay::Reward, OpenRequest::new()), Ok(OpenOutcome::Opened));
    }

    //--- Presentation Hooks -----------------------------------------------

    struct Watcher {
        manager: OverlayManager<TestOverlay>,
        seen: Rc<Cell<Option<OverlayState>>>,
        reopen: Option<TestOverlay>,
    }

    impl Overlay for Watcher {
        fn apply_text(&mut self, _text: &OverlayText) {}

        fn on_close(&mut self) {
            self.seen.set(self.manager.state(TestOverlay::Settings));
            if let Some(key) = self.reopen {
                self.manager.open(key, OpenRequest::new()).unwrap();
            }
        }
    }

    fn register_watcher(
        f: &Fixture,
        reopen: Option<TestOverlay>,
    ) -> Rc<Cell<Option<OverlayState>>> {
        let seen = Rc::new(Cell::new(None));
        let (handle, shared) = (f.manager.clone(), Rc::clone(&seen));
        f.manager.register(
            TestOverlay::Settings,
            OverlayText::default(),
            move || Watcher {
                manager: handle.clone(),
                seen: Rc::clone(&shared),
                reopen,
            },
        );
        seen
    }

    #[test]
    fn on_close_observes_closing_state() {
        let f = fixture();
        let seen = register_watcher(&f, None);

        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();
        f.manager.close(TestOverlay::Settings);

        assert_eq!(seen.get(), Some(OverlayState::Closing));
        assert_eq!(f.manager.state(TestOverlay::Settings), Some(OverlayState::Closed));
    }

    #[test]
    fn on_close_may_open_another_overlay_suppressing_all_closed() {
        let f = fixture();
        register_watcher(&f, Some(TestOverlay::Confirm));
        let events = f.manager.subscribe();

        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();
        f.manager.close(TestOverlay::Settings);

        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Confirm]);
        assert!(!events.try_iter().any(|event| event == OverlayEvent::AllClosed));
    }

    struct Meddler {
        manager: OverlayManager<TestOverlay>,
        result: Rc<Cell<Option<Result<OpenOutcome, OverlayError<TestOverlay>>>>>,
    }

    impl Overlay for Meddler {
        fn apply_text(&mut self, _text: &OverlayText) {
            self.result
                .set(Some(self.manager.open(TestOverlay::Confirm, OpenRequest::new())));
        }
    }

    #[test]
    fn reentrant_open_from_apply_text_is_rejected() {
        let f = fixture();
        let result = Rc::new(Cell::new(None));
        let (handle, shared) = (f.manager.clone(), Rc::clone(&result));
        f.manager.register(TestOverlay::Settings, OverlayText::default(), move || Meddler {
            manager: handle.clone(),
            result: Rc::clone(&shared),
        });

        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();

        assert_eq!(result.get(), Some(Err(OverlayError::Reentrant(TestOverlay::Confirm))));
        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Settings]);
    }

    struct Faulty {
        calls: Rc<Cell<u32>>,
        panic_on_call: u32,
    }

    impl Overlay for Faulty {
        fn apply_text(&mut self, _text: &OverlayText) {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == self.panic_on_call {
                panic!("text binding failed");
            }
        }
    }

    fn register_faulty(f: &Fixture, panic_on_call: u32) -> Rc<Cell<u32>> {
        let calls = Rc::new(Cell::new(0));
        let shared = Rc::clone(&calls);
        f.manager.register(TestOverlay::Settings, OverlayText::default(), move || Faulty {
            calls: Rc::clone(&shared),
            panic_on_call,
        });
        calls
    }

    #[test]
    fn panic_while_presenting_is_reported_and_leaves_slot_closed() {
        let f = fixture();
        register_faulty(&f, 1);
        let events = f.manager.subscribe();
        let token = Rc::new(());
        let held = Rc::clone(&token);

        let outcome = f
            .manager
            .open(TestOverlay::Settings, OpenRequest::new().on_confirm(move || drop(held)));

        assert_eq!(outcome, Err(OverlayError::Presentation(TestOverlay::Settings)));
        assert_eq!(f.manager.state(TestOverlay::Settings), Some(OverlayState::Closed));
        assert!(f.manager.open_overlays().is_empty());
        assert_eq!(f.manager.text(TestOverlay::Settings), None);
        assert!(events.try_recv().is_err());
        assert_eq!(Rc::strong_count(&token), 1);

        // The manager stays usable
        assert_eq!(f.manager.open(TestOverlay::Reward, OpenRequest::new()), Ok(OpenOutcome::Opened));
    }

    #[test]
    fn panic_while_refreshing_keeps_overlay_active() {
        let f = fixture();
        let calls = register_faulty(&f, 2);
        let (ran, action) = counter();

        f.manager
            .open(TestOverlay::Settings, OverlayConfig::new().label("First").into())
            .unwrap();
        let outcome = f.manager.open(
            TestOverlay::Settings,
            OpenRequest::new()
                .with_config(OverlayConfig::new().label("Second"))
                .on_confirm(action),
        );

        assert_eq!(outcome, Err(OverlayError::Presentation(TestOverlay::Settings)));
        assert_eq!(calls.get(), 2);
        assert!(f.manager.is_open(TestOverlay::Settings));
        assert_eq!(f.manager.open_overlays(), vec![TestOverlay::Settings]);
        assert_eq!(f.manager.text(TestOverlay::Settings).unwrap().label, "First");

        // The rejected request's continuation was never stored
        f.manager.confirm(TestOverlay::Settings);
        assert_eq!(ran.get(), 0);
    }

    struct Listener {
        events: Receiver<OverlayEvent<TestOverlay>>,
        opened_before_text: Rc<Cell<Option<bool>>>,
    }

    impl Overlay for Listener {
        fn apply_text(&mut self, _text: &OverlayText) {
            self.opened_before_text
                .set(Some(self.events.try_recv().is_ok()));
        }
    }

    #[test]
    fn opened_is_broadcast_after_text_is_applied() {
        let f = fixture();
        let events = f.manager.subscribe();
        let observed = Rc::new(Cell::new(None));
        let (receiver, shared) = (events.clone(), Rc::clone(&observed));
        f.manager.register(TestOverlay::Settings, OverlayText::default(), move || Listener {
            events: receiver.clone(),
            opened_before_text: Rc::clone(&shared),
        });

        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();

        assert_eq!(observed.get(), Some(false));
        assert_eq!(events.try_recv(), Ok(OverlayEvent::Opened(TestOverlay::Settings)));
    }

    struct Relay {
        manager: OverlayManager<TestOverlay>,
    }

    impl Overlay for Relay {
        fn apply_text(&mut self, _text: &OverlayText) {}

        fn on_close(&mut self) {
            self.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();
            self.manager.close(TestOverlay::Confirm);
        }
    }

    #[test]
    fn nested_open_and_close_in_on_close_yields_two_all_closed() {
        let f = fixture();
        let handle = f.manager.clone();
        f.manager.register(TestOverlay::Settings, OverlayText::default(), move || Relay {
            manager: handle.clone(),
        });
        let events = f.manager.subscribe();

        f.manager.open(TestOverlay::Settings, OpenRequest::new()).unwrap();
        f.manager.close(TestOverlay::Settings);

        // The outer transition's AllClosed settles after the nested one
        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                OverlayEvent::Opened(TestOverlay::Settings),
                OverlayEvent::Opened(TestOverlay::Confirm),
                OverlayEvent::AllClosed,
                OverlayEvent::AllClosed,
            ]
        );
        assert!(f.manager.open_overlays().is_empty());
    }

    //--- Registration -----------------------------------------------------

    #[test]
    fn reregistering_replaces_factory_and_defaults() {
        let f = fixture();
        let journal = Rc::clone(&f.journal);
        register_dialog(
            &f.manager,
            TestOverlay::Reward,
            "reward-v2",
            OverlayText::new("Bonus!", "Claim", "Later"),
            &journal,
        );

        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();

        assert_eq!(f.reward_builds.get(), 0);
        assert_eq!(f.manager.text(TestOverlay::Reward).unwrap().label, "Bonus!");
        assert_eq!(f.journal.borrow()[0], "reward-v2:text:Bonus!");
    }

    #[test]
    fn validate_reports_missing_factories() {
        let f = fixture();
        assert_eq!(
            f.manager.validate(&[TestOverlay::Reward, TestOverlay::Confirm]),
            Ok(())
        );
        assert_eq!(
            f.manager.validate(&[TestOverlay::Reward, TestOverlay::Unregistered]),
            Err(OverlayError::MissingFactory(TestOverlay::Unregistered))
        );
    }

    #[test]
    fn error_messages_name_the_overlay() {
        let message = OverlayError::MissingFactory(TestOverlay::Reward).to_string();
        assert!(message.contains("Reward"));
    }

    //--- Back Navigation --------------------------------------------------

    #[test]
    fn back_request_names_topmost_overlay() {
        let f = fixture();
        let events = f.manager.subscribe();
        let (fallback, fallback_action) = counter();
        let fallback_action = RefCell::new(Some(fallback_action));
        f.manager.set_back_handler(move || {
            if let Some(action) = fallback_action.borrow_mut().take() {
                action();
            }
        });

        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();

        assert_eq!(f.manager.request_back(), Some(TestOverlay::Confirm));
        assert_eq!(fallback.get(), 0);
        assert_eq!(
            events.try_iter().last(),
            Some(OverlayEvent::BackRequested {
                top: Some(TestOverlay::Confirm)
            })
        );
    }

    #[test]
    fn back_request_on_empty_stack_runs_default_handler() {
        let f = fixture();
        let events = f.manager.subscribe();
        let count = Rc::new(Cell::new(0));
        let observed = Rc::clone(&count);
        f.manager.set_back_handler(move || observed.set(observed.get() + 1));

        assert_eq!(f.manager.request_back(), None);
        assert_eq!(count.get(), 1);
        assert_eq!(events.try_recv(), Ok(OverlayEvent::BackRequested { top: None }));
    }

    //--- Termination ------------------------------------------------------

    #[test]
    fn terminate_all_closes_top_down_without_continuations() {
        let f = fixture();
        let (ran, action) = counter();
        f.manager
            .open(TestOverlay::Reward, OpenRequest::new().on_confirm(action))
            .unwrap();
        f.manager.open(TestOverlay::Confirm, OpenRequest::new()).unwrap();

        assert_eq!(f.manager.terminate_all(), 2);

        assert!(f.manager.open_overlays().is_empty());
        assert_eq!(ran.get(), 0);
        let closes: Vec<String> = f
            .journal
            .borrow()
            .iter()
            .filter(|entry| entry.ends_with(":close"))
            .cloned()
            .collect();
        assert_eq!(closes, vec!["confirm:close", "reward:close"]);
    }

    #[test]
    fn attached_manager_terminates_on_disable_and_quit() {
        let f = fixture();
        let mode = ModeSwitch::new(RuntimeMode::Playing);
        let router = LifecycleRouter::new(mode.clone());
        let subscriptions = f.manager.attach(&router, ContextFilter::PLAY_MODE_ONLY);
        assert!(!subscriptions.is_empty());

        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        router.dispatch(SourceEvent::OnDisable);
        assert!(f.manager.open_overlays().is_empty());

        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        router.dispatch(SourceEvent::Update);
        assert!(f.manager.is_open(TestOverlay::Reward));

        router.dispatch(SourceEvent::ApplicationQuit);
        assert!(!f.manager.is_open(TestOverlay::Reward));

        // Filtered out in edit mode
        mode.set(RuntimeMode::Editing);
        f.manager.open(TestOverlay::Reward, OpenRequest::new()).unwrap();
        router.dispatch(SourceEvent::OnDisable);
        assert!(f.manager.is_open(TestOverlay::Reward));
    }

    #[test]
    fn attach_does_not_keep_manager_alive() {
        crate::test_support::init_logging();
        let router = LifecycleRouter::new(ModeSwitch::default());
        {
            let manager = OverlayManager::<TestOverlay>::new();
            manager.attach(&router, ContextFilter::ALWAYS);
        }
        assert!(!router.is_empty());

        // The first hook to fire finds the manager gone and removes them all
        let report = router.dispatch(SourceEvent::OnDisable);
        assert_eq!(report.invoked, 1);
        assert_eq!(report.failed, 0);
        assert!(router.is_empty());

        assert_eq!(router.dispatch(SourceEvent::ApplicationQuit).invoked, 0);
    }

    #[test]
    fn live_manager_keeps_its_hooks() {
        let f = fixture();
        let router = LifecycleRouter::new(ModeSwitch::default());
        let subscriptions = f.manager.attach(&router, ContextFilter::ALWAYS);

        router.dispatch(SourceEvent::OnDisable);
        router.dispatch(SourceEvent::Awake);

        assert_eq!(router.len(), subscriptions.len());
    }

    #[test]
    fn initialize_counts_registered_overlays() {
        let f = fixture();
        assert_eq!(f.manager.initialize(), 3);
    }
}
