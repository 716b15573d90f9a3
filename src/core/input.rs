use crate::game::status::PilotState;
use log::info;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

// --- Keys ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Lowercase ASCII letter or digit.
    Char(char),
    Escape,
    F(u8),
    PageUp,
    PageDown,
    Space,
    Enter,
}

impl Key {
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "esc" | "escape" => return Some(Self::Escape),
            "page up" | "pageup" | "pgup" => return Some(Self::PageUp),
            "page down" | "pagedown" | "pgdn" => return Some(Self::PageDown),
            "space" => return Some(Self::Space),
            "enter" | "return" => return Some(Self::Enter),
            _ => {}
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Some(Self::Char(c)),
            (Some('f'), Some(_)) => match name[1..].parse::<u8>() {
                Ok(n @ 1..=24) => Some(Self::F(n)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{}", c),
            Self::Escape => f.write_str("esc"),
            Self::F(n) => write!(f, "f{}", n),
            Self::PageUp => f.write_str("page up"),
            Self::PageDown => f.write_str("page down"),
            Self::Space => f.write_str("space"),
            Self::Enter => f.write_str("enter"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub ctrl: bool,
    pub key: Key,
}

impl FromStr for Hotkey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (ctrl, rest) = match lower.strip_prefix("ctrl+") {
            Some(rest) => (true, rest),
            None => (false, lower.as_str()),
        };
        Key::parse(rest)
            .map(|key| Self { ctrl, key })
            .ok_or_else(|| format!("Unrecognised hotkey '{}'", trimmed))
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+{}", self.key)
        } else {
            write!(f, "{}", self.key)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotkeyAction {
    Sync,
    Cancel,
    Exit,
    ToggleHardRock,
    ToggleDoubleTime,
    ToggleNightcore,
    ToggleOrganic,
    ToggleDebug,
}

impl HotkeyAction {
    /// Command word accepted by the headless listener.
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "sync" => Some(Self::Sync),
            "cancel" => Some(Self::Cancel),
            "exit" | "quit" => Some(Self::Exit),
            "hr" => Some(Self::ToggleHardRock),
            "dt" => Some(Self::ToggleDoubleTime),
            "nc" => Some(Self::ToggleNightcore),
            "organic" => Some(Self::ToggleOrganic),
            "debug" => Some(Self::ToggleDebug),
            _ => None,
        }
    }
}

pub type Bindings = Vec<(Hotkey, HotkeyAction)>;

// --- Collaborator seams ---

/// OS pointer and keyboard. Only the engine drives it while running.
pub trait InputSink {
    fn move_pointer_to(&mut self, x: i32, y: i32) -> Result<(), String>;
    fn key_down(&mut self, key: Key) -> Result<(), String>;
    fn key_up(&mut self, key: Key) -> Result<(), String>;
    fn pointer_position(&self) -> Result<(i32, i32), String>;
    fn screen_size(&self) -> (u32, u32);
}

pub trait WindowProbe {
    fn foreground_title(&self) -> String;
}

// --- Shared flags ---

/// Written by the hotkey listener, consumed and cleared by the engine.
#[derive(Debug, Default)]
pub struct Signals {
    state: AtomicU8,
    sync_requested: AtomicBool,
    sync_time_bits: AtomicU64,
    cancel_requested: AtomicBool,
    shutdown_requested: AtomicBool,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn publish_state(&self, state: PilotState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline(always)]
    pub fn state(&self) -> PilotState {
        PilotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Ignored unless the engine is armed.
    pub fn request_sync(&self, pressed_at: f64) -> bool {
        if self.state() != PilotState::Armed {
            return false;
        }
        self.sync_time_bits.store(pressed_at.to_bits(), Ordering::Relaxed);
        self.sync_requested.store(true, Ordering::Release);
        true
    }

    /// Keypress timestamp of a pending sync request, clearing it.
    pub fn take_sync(&self) -> Option<f64> {
        self.sync_requested
            .swap(false, Ordering::Acquire)
            .then(|| f64::from_bits(self.sync_time_bits.load(Ordering::Relaxed)))
    }

    /// Ignored unless the engine is running.
    pub fn request_cancel(&self) -> bool {
        if self.state() != PilotState::Running {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        true
    }

    /// Cancellation or shutdown; checked on every engine tick.
    #[inline(always)]
    pub fn should_stop(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire) || self.shutdown_requested()
    }

    pub fn clear_requests(&self) {
        self.sync_requested.store(false, Ordering::Release);
        self.cancel_requested.store(false, Ordering::Release);
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }
}

/// User-facing motion toggles.
#[derive(Debug, Default)]
pub struct Toggles {
    organic_motion: AtomicBool,
    debug_visuals: AtomicBool,
}

impl Toggles {
    pub fn new(organic_motion: bool, debug_visuals: bool) -> Self {
        Self { organic_motion: AtomicBool::new(organic_motion), debug_visuals: AtomicBool::new(debug_visuals) }
    }

    #[inline(always)]
    pub fn organic_motion(&self) -> bool {
        self.organic_motion.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn debug_visuals(&self) -> bool {
        self.debug_visuals.load(Ordering::Relaxed)
    }

    pub fn toggle_organic_motion(&self) -> bool {
        let now = !self.organic_motion.fetch_xor(true, Ordering::Relaxed);
        info!("Organic motion {}", if now { "ON" } else { "OFF" });
        now
    }

    pub fn toggle_debug_visuals(&self) -> bool {
        let now = !self.debug_visuals.fetch_xor(true, Ordering::Relaxed);
        info!("Debug visuals {}", if now { "ON" } else { "OFF" });
        now
    }
}
