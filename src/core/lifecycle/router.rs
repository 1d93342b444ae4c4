//=========================================================================
// Lifecycle Router
//=========================================================================
//
// Registry of lifecycle callbacks keyed by source event and filtered by
// runtime mode.
//
// Architecture:
//   Host ──dispatch(event)──> LifecycleRouter
//                                ├─ origin  = event.origin()
//                                ├─ mode    = ModeSource::current_mode()
//                                └─ for each registration (in order):
//                                     event matches && filter ∋ mode
//                                       → catch_unwind(action)
//
// The registry borrow is released before any callback runs, so callbacks
// may register, unregister, or dispatch again.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use log::{debug, error, trace};

//=== Internal Dependencies ===============================================

use super::context::{ContextFilter, ModeSource, RuntimeMode};
use super::source_event::{InvocationOrigin, SourceEvent};

//=== Public Types ========================================================

/// A zero-argument lifecycle callback.
///
/// Identity is the `Rc` allocation: registering a clone of the same `Rc`
/// for the same event replaces the earlier entry.
pub type LifecycleAction = Rc<dyn Fn()>;

/// Opaque identifier of a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Summary of a single [`LifecycleRouter::dispatch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: SourceEvent,
    pub origin: InvocationOrigin,
    pub mode: RuntimeMode,
    /// Callbacks that ran to completion.
    pub invoked: usize,
    /// Callbacks that panicked.
    pub failed: usize,
}

//=== Internal State ======================================================

struct Registration {
    id: RegistrationId,
    action: LifecycleAction,
    filter: ContextFilter,
    event: SourceEvent,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Registration>,
    next_id: u64,
}

impl Registry {
    fn position(&self, action: &LifecycleAction, event: SourceEvent) -> Option<usize> {
        self.entries
            .iter()
            .position(|r| r.event == event && same_action(&r.action, action))
    }

    fn contains(&self, id: RegistrationId) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }
}

struct RouterInner {
    registry: RefCell<Registry>,
    mode_source: Box<dyn ModeSource>,
}

//=== LifecycleRouter =====================================================

/// Routes raw lifecycle signals to interested callbacks.
///
/// Cheap to clone; all clones share one registry. Not thread-safe: the
/// router lives on the main loop's thread.
#[derive(Clone)]
pub struct LifecycleRouter {
    inner: Rc<RouterInner>,
}

impl LifecycleRouter {
    //--- Construction -----------------------------------------------------

    /// Creates an empty router that reads the current mode from `mode_source`.
    pub fn new<M>(mode_source: M) -> Self
    where
        M: ModeSource + 'static,
    {
        Self::with_boxed_source(Box::new(mode_source))
    }

    /// Like [`new`](Self::new), for a mode source that is already boxed.
    pub fn with_boxed_source(mode_source: Box<dyn ModeSource>) -> Self {
        Self {
            inner: Rc::new(RouterInner {
                registry: RefCell::new(Registry::default()),
                mode_source,
            }),
        }
    }

    //--- Registration -----------------------------------------------------

    /// Registers `action` for `event`, active in the modes selected by `filter`.
    ///
    /// If the same action is already registered for `event`, the earlier
    /// entry is removed first and the new one is appended, keeping its
    /// registration id. The registry never holds duplicates.
    pub fn register(
        &self,
        action: LifecycleAction,
        filter: ContextFilter,
        event: SourceEvent,
    ) -> Subscription {
        let mut registry = self.inner.registry.borrow_mut();

        let id = match registry.position(&action, event) {
            Some(pos) => {
                let previous = registry.entries.remove(pos);
                debug!(
                    target: "lifecycle",
                    "Re-registered callback {:?} for {:?} (filter {:?} -> {:?})",
                    previous.id, event, previous.filter, filter
                );
                previous.id
            }
            None => {
                let id = RegistrationId(registry.next_id);
                registry.next_id += 1;
                trace!(target: "lifecycle", "Registered callback {:?} for {:?}", id, event);
                id
            }
        };

        registry.entries.push(Registration {
            id,
            action,
            filter,
            event,
        });

        Subscription {
            router: Rc::downgrade(&self.inner),
            id,
            event,
        }
    }

    /// Wraps `callback` in a fresh [`LifecycleAction`] and registers it.
    pub fn register_fn<F>(&self, callback: F, filter: ContextFilter, event: SourceEvent) -> Subscription
    where
        F: Fn() + 'static,
    {
        self.register(Rc::new(callback), filter, event)
    }

    /// Removes `action` from `event`. Returns `false` if it was not registered.
    pub fn unregister(&self, action: &LifecycleAction, event: SourceEvent) -> bool {
        let mut registry = self.inner.registry.borrow_mut();
        match registry.position(action, event) {
            Some(pos) => {
                let removed = registry.entries.remove(pos);
                trace!(target: "lifecycle", "Unregistered callback {:?} from {:?}", removed.id, event);
                true
            }
            None => false,
        }
    }

    //--- Dispatch ---------------------------------------------------------

    /// Delivers `event` to every matching callback, in registration order.
    ///
    /// A callback is invoked when it was registered for exactly `event` and
    /// its filter includes the current mode. Panicking callbacks are logged
    /// and counted in [`DispatchReport::failed`]; the remaining callbacks
    /// still run. Callbacks unregistered by an earlier sibling during this
    /// dispatch are skipped; callbacks registered during it wait for the
    /// next one.
    pub fn dispatch(&self, event: SourceEvent) -> DispatchReport {
        let origin = event.origin();
        let mode = self.inner.mode_source.current_mode();

        // Snapshot targets so no borrow is held while user code runs
        let targets: Vec<(RegistrationId, LifecycleAction)> = self
            .inner
            .registry
            .borrow()
            .entries
            .iter()
            .filter(|r| r.event == event && r.filter.includes(mode))
            .map(|r| (r.id, Rc::clone(&r.action)))
            .collect();

        trace!(
            target: "lifecycle",
            "Dispatching {:?} ({:?}) in {:?} mode to {} callback(s)",
            event, origin, mode, targets.len()
        );

        let mut report = DispatchReport {
            event,
            origin,
            mode,
            invoked: 0,
            failed: 0,
        };

        for (id, action) in targets {
            if !self.inner.registry.borrow().contains(id) {
                trace!(target: "lifecycle", "Callback {:?} was removed mid-dispatch, skipping", id);
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| action())) {
                Ok(()) => report.invoked += 1,
                Err(payload) => {
                    report.failed += 1;
                    error!(
                        target: "lifecycle",
                        "Callback {:?} for {:?} ({:?}) panicked: {}",
                        id, event, origin, panic_message(payload.as_ref())
                    );
                }
            }
        }

        report
    }

    //--- Query API --------------------------------------------------------

    /// The mode the router would dispatch in right now.
    pub fn mode(&self) -> RuntimeMode {
        self.inner.mode_source.current_mode()
    }

    /// Total number of registrations across all events.
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations for `event`, regardless of filter.
    pub fn count_for(&self, event: SourceEvent) -> usize {
        self.inner
            .registry
            .borrow()
            .entries
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Returns `true` if `action` is registered for `event`.
    pub fn is_registered(&self, action: &LifecycleAction, event: SourceEvent) -> bool {
        self.inner.registry.borrow().position(action, event).is_some()
    }
}

impl fmt::Debug for LifecycleRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleRouter")
            .field("registrations", &self.len())
            .field("mode", &self.mode())
            .finish()
    }
}

//=== Subscription ========================================================

/// Handle to a single registration.
///
/// Dropping the handle does not unregister; call [`Subscription::unsubscribe`].
/// The handle does not keep the router alive.
#[derive(Debug, Clone)]
pub struct Subscription {
    router: Weak<RouterInner>,
    id: RegistrationId,
    event: SourceEvent,
}

impl Subscription {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn event(&self) -> SourceEvent {
        self.event
    }

    /// Removes the registration. Returns `false` if it was already gone or
    /// the router has been dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.router.upgrade() else {
            return false;
        };

        let mut registry = inner.registry.borrow_mut();
        match registry.entries.iter().position(|r| r.id == self.id) {
            Some(pos) => {
                registry.entries.remove(pos);
                trace!(target: "lifecycle", "Unsubscribed {:?} from {:?}", self.id, self.event);
                true
            }
            None => false,
        }
    }
}

//=== Helpers =============================================================

fn same_action(a: &LifecycleAction, b: &LifecycleAction) -> bool {
    // Compare data addresses only; vtable pointers are not guaranteed unique
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
