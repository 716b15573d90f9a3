pub mod headless;
#[cfg(windows)]
pub mod win32;

use crate::config::{Config, HEADLESS_SCREEN_SIZE};
use crate::core::input::{Bindings, HotkeyAction, InputSink, Signals, WindowProbe};
use log::info;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct Backend {
    pub input: Box<dyn InputSink>,
    pub probe: Box<dyn WindowProbe>,
    dry_run: bool,
}

impl Backend {
    #[cfg(windows)]
    pub fn new(config: &Config, dry_run: bool) -> Result<Self, String> {
        if dry_run {
            return Ok(Self::headless(config));
        }
        info!("Using the Win32 input backend.");
        Ok(Self {
            input: Box::new(win32::Win32Input::new()?),
            probe: Box::new(win32::ForegroundWindow),
            dry_run: false,
        })
    }

    #[cfg(not(windows))]
    pub fn new(config: &Config, _dry_run: bool) -> Result<Self, String> {
        Ok(Self::headless(config))
    }

    fn headless(config: &Config) -> Self {
        info!("Using the dry-run input backend; actions are only logged.");
        Self {
            input: Box::new(headless::DryRunInput::new(HEADLESS_SCREEN_SIZE)),
            probe: Box::new(headless::FixedTitle(config.debug_window_title.clone())),
            dry_run: true,
        }
    }

    /// Spawns the thread that turns key presses (or stdin commands in dry-run
    /// mode) into actions.
    pub fn spawn_listener(
        &self,
        bindings: Bindings,
        signals: Arc<Signals>,
        on_action: impl FnMut(HotkeyAction) + Send + 'static,
    ) -> Result<JoinHandle<()>, String> {
        let builder = thread::Builder::new().name("hotkeys".to_string());
        let spawned = if self.dry_run {
            builder.spawn(move || headless::run_stdin_listener(signals, on_action))
        } else {
            Self::spawn_native(builder, bindings, signals, on_action)
        };
        spawned.map_err(|e| format!("Failed to start hotkey listener: {}", e))
    }

    #[cfg(windows)]
    fn spawn_native(
        builder: thread::Builder,
        bindings: Bindings,
        signals: Arc<Signals>,
        on_action: impl FnMut(HotkeyAction) + Send + 'static,
    ) -> std::io::Result<JoinHandle<()>> {
        builder.spawn(move || win32::run_hotkey_listener(bindings, signals, on_action))
    }

    #[cfg(not(windows))]
    fn spawn_native(
        builder: thread::Builder,
        _bindings: Bindings,
        signals: Arc<Signals>,
        on_action: impl FnMut(HotkeyAction) + Send + 'static,
    ) -> std::io::Result<JoinHandle<()>> {
        builder.spawn(move || headless::run_stdin_listener(signals, on_action))
    }
}
