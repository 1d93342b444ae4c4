//=========================================================================
// Source Events & Invocation Origins
//
// Defines the closed set of raw lifecycle signals the host environment can
// raise, and the coarser origin each one classifies to.
//
// Responsibilities:
// - Enumerate every lifecycle signal the router understands
// - Classify signals into origins through a constant lookup table
//
// Notes:
// Classification is a pure `const fn`. It is total over `SourceEvent` and
// can be evaluated at compile time.
//
//=========================================================================

//=== SourceEvent =========================================================

/// A raw lifecycle signal raised by the host engine or editor.
///
/// The discriminant doubles as the index into [`ORIGIN_TABLE`], so variants
/// must stay in declaration order with [`SourceEvent::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceEvent {
    //--- Component lifecycle ----------------------------------------------
    /// Construction of the owning component.
    Awake,
    /// First frame after construction.
    Start,
    OnEnable,
    OnDisable,

    //--- Frame ticks ------------------------------------------------------
    Update,
    LateUpdate,
    FixedUpdate,

    //--- Editor / runtime transitions -------------------------------------
    /// Code was recompiled and reloaded in place.
    ScriptsReloaded,
    ApplicationQuit,
    EditorQuitting,
    EnteredEditMode,
    ExitingEditMode,
    EnteredPlayMode,
    ExitingPlayMode,

    //--- Build hooks ------------------------------------------------------
    PreprocessBuild,
    PostprocessBuild,

    //--- Editor load phases -----------------------------------------------
    /// Editor finished loading the project.
    EditorLoad,
    /// Editor became interactive after loading.
    EditorStart,
}

impl SourceEvent {
    /// Every source event, in discriminant order.
    pub const ALL: [SourceEvent; 18] = [
        SourceEvent::Awake,
        SourceEvent::Start,
        SourceEvent::OnEnable,
        SourceEvent::OnDisable,
        SourceEvent::Update,
        SourceEvent::LateUpdate,
        SourceEvent::FixedUpdate,
        SourceEvent::ScriptsReloaded,
        SourceEvent::ApplicationQuit,
        SourceEvent::EditorQuitting,
        SourceEvent::EnteredEditMode,
        SourceEvent::ExitingEditMode,
        SourceEvent::EnteredPlayMode,
        SourceEvent::ExitingPlayMode,
        SourceEvent::PreprocessBuild,
        SourceEvent::PostprocessBuild,
        SourceEvent::EditorLoad,
        SourceEvent::EditorStart,
    ];

    /// Classifies this event into its invocation origin.
    #[inline]
    pub const fn origin(self) -> InvocationOrigin {
        ORIGIN_TABLE[self as usize]
    }
}

//=== InvocationOrigin ====================================================

/// Normalized classification of a [`SourceEvent`].
///
/// Consumers that care about *why* they were called rather than the exact
/// signal match on this instead of enumerating source events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationOrigin {
    Initialization,
    Termination,
    EngineTick,
    ApplicationQuit,
    ApplicationStateChanged,
    Unknown,
}

//=== Origin Table ========================================================
//
// Indexed by `SourceEvent as usize`. The unit tests pin every row.
//
const ORIGIN_TABLE: [InvocationOrigin; SourceEvent::ALL.len()] = {
    use InvocationOrigin::*;
    [
        Initialization,          // Awake
        Initialization,          // Start
        Initialization,          // OnEnable
        Termination,             // OnDisable
        EngineTick,              // Update
        EngineTick,              // LateUpdate
        EngineTick,              // FixedUpdate
        Unknown,                 // ScriptsReloaded
        ApplicationQuit,         // ApplicationQuit
        ApplicationQuit,         // EditorQuitting
        ApplicationStateChanged, // EnteredEditMode
        ApplicationStateChanged, // ExitingEditMode
        ApplicationStateChanged, // EnteredPlayMode
        ApplicationStateChanged, // ExitingPlayMode
        Unknown,                 // PreprocessBuild
        Unknown,                 // PostprocessBuild
        Initialization,          // EditorLoad
        Initialization,          // EditorStart
    ]
};

//=========================================================================
// Unit Tests
//=========================================================================
