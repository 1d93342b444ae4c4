//=========================================================================
// Overlay Broadcasts
//=========================================================================
//
// Fan-out of overlay stack notifications to any number of subscribers.
//
// Architecture:
//   OverlayManager ──send(event)──> Broadcaster
//                                     ├─ Sender ──> Receiver (icon badge)
//                                     ├─ Sender ──> Receiver (back routing)
//                                     └─ ...
//
// Each subscriber owns an unbounded crossbeam receiver and drains it on
// its own schedule. Subscribers that drop their receiver are pruned on the
// next send.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

//=== Internal Dependencies ===============================================

use super::OverlayKey;

//=== OverlayEvent ========================================================

/// Notification emitted by the overlay stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent<K: OverlayKey> {
    /// An overlay went from closed to active. Sent after its text is applied.
    Opened(K),

    /// The last open overlay closed. Sent once per non-empty → empty transition.
    ///
    /// Sent when the closing overlay finishes teardown, so if its `on_close`
    /// hook opens and closes another overlay, the nested `AllClosed` arrives
    /// first and both follow the nested `Opened`.
    AllClosed,

    /// Back was requested; `top` is the overlay expected to react, if any.
    BackRequested { top: Option<K> },
}

//=== Broadcaster =========================================================

pub(crate) struct Broadcaster<K: OverlayKey> {
    subscribers: Vec<Sender<OverlayEvent<K>>>,
}

impl<K: OverlayKey> Broadcaster<K> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<OverlayEvent<K>> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Sends `event` to every live subscriber, pruning disconnected ones.
    pub fn send(&mut self, event: OverlayEvent<K>) {
        self.subscribers.retain(|tx| {
            let alive = tx.send(event).is_ok();
            if !alive {
                debug!(target: "overlay", "Dropping disconnected overlay subscriber");
            }
            alive
        });
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
