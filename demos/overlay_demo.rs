//=========================================================================
// Overlay Demo
//
// Opens a reward offer on startup and drives it from a winit window.
//
// Controls:
// - Escape: back. Cancels the topmost overlay, or logs when none is open.
// - Close the window to quit; open overlays are torn down on exit.
//
// Run with:
//   RUST_LOG=debug cargo run --example overlay_demo
//
//=========================================================================

use std::cell::Cell;
use std::rc::Rc;

use env_logger::{Builder, Env};
use lifecycle_overlay::prelude::*;
use log::info;

//=== Overlays ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Menu {
    Reward,
    Confirm,
}

impl OverlayKey for Menu {}

struct ConsoleDialog {
    name: &'static str,
}

impl Overlay for ConsoleDialog {
    fn apply_text(&mut self, text: &OverlayText) {
        info!("[{}] {} ({} / {})", self.name, text.label, text.confirm, text.cancel);
    }

    fn on_close(&mut self) {
        info!("[{}] closed", self.name);
    }
}

//=== Setup ===============================================================

fn register_overlays(core: &CoreContext<Menu>) {
    core.overlays.register(
        Menu::Reward,
        OverlayText::new("Watch an ad for 100 coins?", "Watch", "No thanks"),
        || ConsoleDialog { name: "reward" },
    );
    core.overlays.register(
        Menu::Confirm,
        OverlayText::new("Are you sure?", "Yes", "No"),
        || ConsoleDialog { name: "confirm" },
    );

    core.overlays.set_back_handler(|| info!("Back pressed with nothing open"));
}

/// Opens the reward offer; declining it asks for confirmation first.
fn offer_reward(overlays: &OverlayManager<Menu>) {
    let handle = overlays.clone();
    let request = OpenRequest::new()
        .on_confirm(|| info!("Reward granted"))
        .on_cancel(move || {
            let retry = handle.clone();
            let confirm = OpenRequest::new()
                .with_config(OverlayConfig::new().label("Skip the reward?"))
                .on_confirm(|| info!("Reward declined"))
                .on_cancel(move || offer_reward(&retry));
            if let Err(e) = handle.open(Menu::Confirm, confirm) {
                log::error!("{}", e);
            }
        });

    if let Err(e) = overlays.open(Menu::Reward, request) {
        log::error!("{}", e);
    }
}

/// Escape cancels whatever is on top.
fn route_back_requests(core: &CoreContext<Menu>) {
    let events = core.overlays.subscribe();
    let overlays = core.overlays.clone();
    let frames = Rc::new(Cell::new(0u64));

    core.router.register_fn(
        move || {
            frames.set(frames.get() + 1);
            for event in events.try_iter() {
                match event {
                    OverlayEvent::BackRequested { top: Some(top) } => {
                        overlays.cancel(top);
                    }
                    OverlayEvent::AllClosed => info!("All overlays closed at frame {}", frames.get()),
                    _ => {}
                }
            }
        },
        ContextFilter::PLAY_MODE_ONLY,
        SourceEvent::Update,
    );
}

//=== Main ================================================================

fn main() -> Result<(), PlatformError> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let core = CoreBuilder::<Menu>::new()
        .with_tps(50.0)
        .build()
        .init(|core| {
            register_overlays(core);
            route_back_requests(core);

            let overlays = core.overlays.clone();
            core.router
                .register_fn(move || offer_reward(&overlays), ContextFilter::ALWAYS, SourceEvent::Start);
        });

    if let Err(e) = core.overlays.validate(&[Menu::Reward, Menu::Confirm]) {
        log::error!("{}", e);
    }

    core.run()?;

    let closed = core.teardown();
    info!("Demo finished ({} overlay(s) still open at exit)", closed);
    Ok(())
}
