//=========================================================================
// Context Filter & Runtime Mode
//=========================================================================
//
// Which runtime mode the host is in (editing vs. playing), where that
// answer comes from, and the bitset callbacks use to opt into modes.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::Cell;
use std::rc::Rc;

use bitflags::bitflags;

//=== RuntimeMode =========================================================

/// Whether the host is currently being edited or running the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuntimeMode {
    Editing,
    #[default]
    Playing,
}

//=== ContextFilter =======================================================

bitflags! {
    /// Selects the runtime mode(s) in which a callback is active.
    ///
    /// `ALWAYS` is the union of both modes. An empty filter matches nothing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContextFilter: u8 {
        const EDIT_MODE_ONLY = 0b01;
        const PLAY_MODE_ONLY = 0b10;
        const ALWAYS = Self::EDIT_MODE_ONLY.bits() | Self::PLAY_MODE_ONLY.bits();
    }
}

impl ContextFilter {
    /// Returns `true` if a callback with this filter should run in `mode`.
    #[inline]
    pub const fn includes(self, mode: RuntimeMode) -> bool {
        self.contains(Self::for_mode(mode))
    }

    /// The single-mode filter matching `mode`.
    #[inline]
    pub const fn for_mode(mode: RuntimeMode) -> Self {
        match mode {
            RuntimeMode::Editing => Self::EDIT_MODE_ONLY,
            RuntimeMode::Playing => Self::PLAY_MODE_ONLY,
        }
    }
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self::ALWAYS
    }
}

//=== ModeSource ==========================================================

/// Answers "is the application being edited or running right now?".
///
/// Supplied by the host integration. Closures returning a [`RuntimeMode`]
/// implement it directly.
pub trait ModeSource {
    fn current_mode(&self) -> RuntimeMode;
}

impl<F> ModeSource for F
where
    F: Fn() -> RuntimeMode,
{
    fn current_mode(&self) -> RuntimeMode {
        self()
    }
}

//=== ModeSwitch ==========================================================

/// Shared, settable mode flag.
///
/// Clones observe the same value, so the host can keep one handle and give
/// another to the router.
#[derive(Debug, Clone, Default)]
pub struct ModeSwitch {
    mode: Rc<Cell<RuntimeMode>>,
}

impl ModeSwitch {
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode: Rc::new(Cell::new(mode)),
        }
    }

    pub fn set(&self, mode: RuntimeMode) {
        self.mode.set(mode);
    }

    pub fn get(&self) -> RuntimeMode {
        self.mode.get()
    }
}

impl ModeSource for ModeSwitch {
    fn current_mode(&self) -> RuntimeMode {
        self.get()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
