use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::input::{HotkeyAction, Signals, Toggles};
use crate::core::osu_dir::OsuInstall;
use crate::core::platform::Backend;
use crate::game::mods::ModHandler;
use crate::game::pilot::{Collaborators, Pilot, PilotSettings, Shared};
use crate::game::status::LogStatus;
use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct App {
    config: Config,
    reaction_time: f64,
    dry_run: bool,
    shared: Shared,
}

/// Maps one listener action onto the shared flags.
fn dispatch(action: HotkeyAction, shared: &Shared) {
    match action {
        HotkeyAction::Sync => {
            if shared.signals.request_sync(shared.clock.now()) {
                info!("Sync key pressed.");
            }
        }
        HotkeyAction::Cancel => {
            if shared.signals.request_cancel() {
                info!("Cancel requested.");
            }
        }
        HotkeyAction::Exit => {
            info!("Exit requested.");
            shared.signals.request_shutdown();
        }
        HotkeyAction::ToggleHardRock => {
            shared.mods.toggle_hard_rock();
        }
        HotkeyAction::ToggleDoubleTime => {
            shared.mods.toggle_double_time();
        }
        HotkeyAction::ToggleNightcore => {
            shared.mods.toggle_nightcore();
        }
        HotkeyAction::ToggleOrganic => {
            shared.toggles.toggle_organic_motion();
        }
        HotkeyAction::ToggleDebug => {
            shared.toggles.toggle_debug_visuals();
        }
    }
}

/// Joins the listener thread. A panic there is logged, not propagated.
fn reap_listener(listener: JoinHandle<()>) -> bool {
    match listener.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            warn!("Hotkey listener panicked: {}", reason);
            false
        }
    }
}

impl App {
    pub fn new(config: Config, reaction_time: f64, dry_run: bool) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let shared = Shared {
            clock,
            signals: Arc::new(Signals::new()),
            toggles: Arc::new(Toggles::new(config.organic_motion, config.debug_visuals)),
            mods: Arc::new(ModHandler::new(config.mods)),
        };
        Self { config, reaction_time, dry_run, shared }
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let backend = Backend::new(&self.config, self.dry_run)?;

        let listener_shared = self.shared.clone();
        let bindings = self.config.keys.bindings.clone();
        let listener = backend
            .spawn_listener(bindings, Arc::clone(&self.shared.signals), move |action| dispatch(action, &listener_shared))?;

        info!(
            "Reaction time {:.0}ms, offset {:.0}ms, keys {}/{}, mods {}",
            self.reaction_time * 1000.0,
            self.config.offset_ms,
            self.config.keys.primary,
            self.config.keys.secondary,
            self.shared.mods.active().label()
        );
        for (hotkey, action) in &self.config.keys.bindings {
            info!("  {} -> {:?}", hotkey, action);
        }

        let Backend { input, probe, .. } = backend;
        let parts = Collaborators {
            input,
            probe,
            source: Box::new(OsuInstall::new(self.config.osu_directory.clone())),
            status: Box::new(LogStatus::default()),
        };
        let settings = PilotSettings::from_config(&self.config, self.reaction_time);
        let mut pilot = Pilot::new(settings, parts, self.shared.clone(), StdRng::from_os_rng());

        let result = pilot.run();
        self.shared.signals.request_shutdown();

        if let Err(e) = result {
            error!("Pilot fault: {}", e);
            return Err(e.into());
        }
        // The stdin listener may be blocked on a read; it dies with the process.
        if listener.is_finished() {
            reap_listener(listener);
        }
        Ok(())
    }
}
