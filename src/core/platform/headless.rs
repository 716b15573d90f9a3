use crate::core::input::{HotkeyAction, InputSink, Key, Signals, WindowProbe};
use log::{info, trace, warn};
use std::io::{self, BufRead};
use std::sync::Arc;

/// Logs every action instead of injecting it.
pub struct DryRunInput {
    screen: (u32, u32),
    pointer: (i32, i32),
}

impl DryRunInput {
    pub fn new(screen: (u32, u32)) -> Self {
        let pointer = ((screen.0 / 2) as i32, (screen.1 / 2) as i32);
        Self { screen, pointer }
    }
}

impl InputSink for DryRunInput {
    fn move_pointer_to(&mut self, x: i32, y: i32) -> Result<(), String> {
        trace!("move {} {}", x, y);
        self.pointer = (x, y);
        Ok(())
    }

    fn key_down(&mut self, key: Key) -> Result<(), String> {
        trace!("down {}", key);
        Ok(())
    }

    fn key_up(&mut self, key: Key) -> Result<(), String> {
        trace!("up {}", key);
        Ok(())
    }

    fn pointer_position(&self) -> Result<(i32, i32), String> {
        Ok(self.pointer)
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }
}

/// Always reports the configured title.
pub struct FixedTitle(pub String);

impl WindowProbe for FixedTitle {
    fn foreground_title(&self) -> String {
        self.0.clone()
    }
}

/// One command word per line. Returns on EOF, read error or shutdown.
pub fn run_command_listener(
    input: impl BufRead,
    signals: Arc<Signals>,
    mut on_action: impl FnMut(HotkeyAction),
) {
    info!("Commands: sync, cancel, exit, hr, dt, nc, organic, debug");
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Command input closed: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match HotkeyAction::from_word(&line) {
            Some(action) => on_action(action),
            None => warn!("Unknown command '{}'", line.trim()),
        }
        if signals.shutdown_requested() {
            return;
        }
    }
}

pub fn run_stdin_listener(signals: Arc<Signals>, on_action: impl FnMut(HotkeyAction)) {
    run_command_listener(io::stdin().lock(), signals, on_action);
}
