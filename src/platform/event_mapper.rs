//=========================================================================
// Platform Event Mapper
//
// Translates winit lifecycle and keyboard signals into the router's
// source events and overlay commands.
//
// Responsibilities:
// - Name the source events fired for each winit lifecycle callback
// - Recognize the back key
//
// Kept free of `ActiveEventLoop` so the mapping can be tested without a
// running event loop.
//
//=========================================================================

use winit::event::{ElementState, StartCause};
use winit::keyboard::{Key, NamedKey};

use crate::core::lifecycle::SourceEvent;

//=== Lifecycle Mapping ===================================================

/// Fired once, on the event loop's first iteration.
pub(crate) const STARTUP: [SourceEvent; 1] = [SourceEvent::Awake];

/// Fired on the first `resumed`: enable precedes the first-frame `Start`.
pub(crate) const FIRST_RESUME: [SourceEvent; 2] = [SourceEvent::OnEnable, SourceEvent::Start];

/// Fired on every later `resumed`.
pub(crate) const RESUME: [SourceEvent; 1] = [SourceEvent::OnEnable];

/// Fired after the fixed steps of every frame.
pub(crate) const FRAME_TAIL: [SourceEvent; 2] = [SourceEvent::Update, SourceEvent::LateUpdate];

pub(crate) const SUSPENDED: SourceEvent = SourceEvent::OnDisable;
pub(crate) const EXITING: SourceEvent = SourceEvent::ApplicationQuit;

/// Source events for a `new_events` wake-up.
pub(crate) fn start_events(cause: StartCause) -> &'static [SourceEvent] {
    match cause {
        StartCause::Init => &STARTUP,
        _ => &[],
    }
}

/// Source events for a `resumed` callback.
pub(crate) fn resume_events(first: bool) -> &'static [SourceEvent] {
    if first {
        &FIRST_RESUME
    } else {
        &RESUME
    }
}

//=== Key Mapping =========================================================

/// Escape on press, ignoring auto-repeat.
pub(crate) fn is_back_request(key: &Key, state: ElementState, repeat: bool) -> bool {
    state == ElementState::Pressed && !repeat && matches!(key, Key::Named(NamedKey::Escape))
}

//=========================================================================
// Unit Tests
//=========================================================================
