//=========================================================================
// Lifecycle Event Router
//=========================================================================
//
// Decouples "which raw signal fired" from "who cares about it", filtered
// by whether the game is being edited or running.
//
// Architecture:
//   SourceEvent ──origin()──> InvocationOrigin     (const table)
//   ContextFilter ∋ RuntimeMode ?                   (bitset test)
//   LifecycleRouter
//     └─ registry: Vec<(id, action, filter, event)>
//
//=========================================================================

//=== Module Declarations =================================================

mod context;
mod router;
mod source_event;

//=== Public API ==========================================================

pub use context::{ContextFilter, ModeSource, ModeSwitch, RuntimeMode};
pub use router::{DispatchReport, LifecycleAction, LifecycleRouter, RegistrationId, Subscription};
pub use source_event::{InvocationOrigin, SourceEvent};

pub(crate) use router::panic_message;
