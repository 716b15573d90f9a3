use crate::core::input::{Bindings, Hotkey, HotkeyAction, Key};
use crate::game::mods::ActiveMods;
use crate::game::trajectory::{NoiseParams, SpinnerParams};
use crate::utils::noise::Octaves;
use configparser::ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// Files
pub const CONFIG_INI_PATH: &str = "osu-pilot.ini";
pub const SETTINGS_JSON_PATH: &str = "settings.json";

// Engine cadence (seconds)
pub const POLL_INTERVAL_SECS: f64 = 0.01;
pub const SAMPLE_SLEEP_SECS: f64 = 0.001;
#[cfg(windows)]
pub const LISTENER_POLL_SECS: f64 = 0.001;
pub const DIRECTORY_BACKOFF_SECS: f64 = 5.0;
pub const CIRCLE_HOLD_SECS: f64 = 0.01;
/// Shorter budgets snap straight to the target.
pub const MIN_MOVE_BUDGET_SECS: f64 = 0.01;

// Debug visuals
pub const DEBUG_LOOKAHEAD_OBJECTS: usize = 3;
pub const DEBUG_CIRCLE_BASE_RADIUS: i32 = 40;
pub const DEBUG_CIRCLE_RADIUS_STEP: i32 = 5;

pub const HEADLESS_SCREEN_SIZE: (u32, u32) = (1920, 1080);

#[derive(Debug, Clone, PartialEq)]
pub struct KeyConfig {
    pub primary: Key,
    pub secondary: Key,
    pub bindings: Bindings,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            primary: Key::Char('s'),
            secondary: Key::Char('a'),
            bindings: DEFAULT_BINDINGS
                .iter()
                .filter_map(|&(_, spec, action)| spec.parse().ok().map(|hk| (hk, action)))
                .collect(),
        }
    }
}

/// (ini key, default hotkey, action)
const DEFAULT_BINDINGS: [(&str, &str, HotkeyAction); 8] = [
    ("Sync", "q", HotkeyAction::Sync),
    ("Cancel", "esc", HotkeyAction::Cancel),
    ("Exit", "ctrl+page down", HotkeyAction::Exit),
    ("ToggleHardRock", "f5", HotkeyAction::ToggleHardRock),
    ("ToggleDoubleTime", "f6", HotkeyAction::ToggleDoubleTime),
    ("ToggleNightcore", "f7", HotkeyAction::ToggleNightcore),
    ("ToggleOrganic", "f8", HotkeyAction::ToggleOrganic),
    ("ToggleDebug", "f9", HotkeyAction::ToggleDebug),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub offset_ms: f64,
    pub reaction_time_default: f64,
    pub reaction_time_override: Option<f64>,
    pub spinner: SpinnerParams,
    pub noise: NoiseParams,
    pub keys: KeyConfig,
    pub organic_motion: bool,
    pub debug_visuals: bool,
    pub mods: ActiveMods,
    pub osu_directory: Option<PathBuf>,
    pub debug_window_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offset_ms: 0.0,
            reaction_time_default: 0.150,
            reaction_time_override: None,
            spinner: SpinnerParams::default(),
            noise: NoiseParams::default(),
            keys: KeyConfig::default(),
            organic_motion: false,
            debug_visuals: false,
            mods: ActiveMods::default(),
            osu_directory: None,
            debug_window_title: String::new(),
        }
    }
}

fn bool_str(v: bool) -> String {
    if v { "1".to_string() } else { "0".to_string() }
}

fn create_default_file(path: &Path) -> Result<(), std::io::Error> {
    info!("Config file not found, creating defaults in '{}'.", path.display());
    let d = Config::default();
    let mut conf = Ini::new();

    conf.set("Timing", "OffsetMs", Some(d.offset_ms.to_string()));
    conf.set("Timing", "ReactionTimeDefault", Some(d.reaction_time_default.to_string()));
    conf.set("Timing", "ReactionTimeOverride", Some(String::new()));

    conf.set("Spinner", "Rpm", Some(d.spinner.rpm.to_string()));
    conf.set("Spinner", "Radius", Some(d.spinner.radius.to_string()));
    conf.set("Spinner", "RadiusFluctuation", Some(d.spinner.radius_fluctuation.to_string()));

    conf.set("Noise", "Strength", Some(d.noise.strength.to_string()));
    conf.set("Noise", "Scale", Some(d.noise.scale.to_string()));
    conf.set("Noise", "Octaves", Some(d.noise.octaves.count.to_string()));
    conf.set("Noise", "Persistence", Some(d.noise.octaves.persistence.to_string()));
    conf.set("Noise", "Lacunarity", Some(d.noise.octaves.lacunarity.to_string()));

    conf.set("Keys", "Primary", Some(d.keys.primary.to_string()));
    conf.set("Keys", "Secondary", Some(d.keys.secondary.to_string()));
    for (name, spec, _) in DEFAULT_BINDINGS {
        conf.set("Keys", name, Some(spec.to_string()));
    }

    conf.set("Toggles", "OrganicMotion", Some(bool_str(d.organic_motion)));
    conf.set("Toggles", "DebugVisuals", Some(bool_str(d.debug_visuals)));
    conf.set("Toggles", "HardRock", Some(bool_str(d.mods.hard_rock)));
    conf.set("Toggles", "DoubleTime", Some(bool_str(d.mods.double_time)));
    conf.set("Toggles", "Nightcore", Some(bool_str(d.mods.nightcore)));

    conf.set("Paths", "OsuDirectory", Some(String::new()));
    conf.set("Debug", "WindowTitle", Some(d.debug_window_title));

    conf.write(path)
}

/// Non-empty raw value, if any.
fn raw(conf: &Ini, section: &str, key: &str) -> Option<String> {
    conf.get(section, key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    match raw(conf, section, key) {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for [{}] {}, using default.", v, section, key);
            default
        }),
    }
}

fn flag(conf: &Ini, section: &str, key: &str, default: bool) -> bool {
    parsed::<u8>(conf, section, key, u8::from(default)) != 0
}

fn key(conf: &Ini, name: &str, default: Key) -> Key {
    match raw(conf, "Keys", name) {
        None => default,
        Some(v) => Key::parse(&v).unwrap_or_else(|| {
            warn!("Unknown key '{}' for [Keys] {}, using '{}'.", v, name, default);
            default
        }),
    }
}

fn hotkey(conf: &Ini, name: &str, default: &str) -> Option<Hotkey> {
    let spec = raw(conf, "Keys", name).unwrap_or_else(|| default.to_string());
    match spec.parse() {
        Ok(hk) => Some(hk),
        Err(e) => {
            warn!("{} for [Keys] {}, using '{}'.", e, name, default);
            default.parse().ok()
        }
    }
}

impl Config {
    /// Loads `path`, creating it with defaults first if it does not exist.
    /// Never fails: every unreadable value falls back to its default.
    pub fn load(path: &Path) -> Self {
        let defaults = Self::default();
        if !path.exists() {
            if let Err(e) = create_default_file(path) {
                warn!("Failed to create default config '{}': {}", path.display(), e);
                return defaults;
            }
        }

        let mut conf = Ini::new();
        if let Err(e) = conf.load(path) {
            warn!("Failed to load '{}' ({}), using defaults.", path.display(), e);
            return defaults;
        }

        let mut bindings = Vec::with_capacity(DEFAULT_BINDINGS.len());
        for (name, spec, action) in DEFAULT_BINDINGS {
            if let Some(hk) = hotkey(&conf, name, spec) {
                bindings.push((hk, action));
            }
        }

        Self {
            offset_ms: parsed(&conf, "Timing", "OffsetMs", defaults.offset_ms),
            reaction_time_default: parsed(&conf, "Timing", "ReactionTimeDefault", defaults.reaction_time_default),
            reaction_time_override: raw(&conf, "Timing", "ReactionTimeOverride").and_then(|v| match v.parse() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!("Ignoring invalid [Timing] ReactionTimeOverride '{}'.", v);
                    None
                }
            }),
            spinner: SpinnerParams {
                rpm: parsed(&conf, "Spinner", "Rpm", defaults.spinner.rpm),
                radius: parsed(&conf, "Spinner", "Radius", defaults.spinner.radius),
                radius_fluctuation: parsed(&conf, "Spinner", "RadiusFluctuation", defaults.spinner.radius_fluctuation),
            },
            noise: NoiseParams {
                strength: parsed(&conf, "Noise", "Strength", defaults.noise.strength),
                scale: parsed(&conf, "Noise", "Scale", defaults.noise.scale),
                octaves: Octaves {
                    count: parsed(&conf, "Noise", "Octaves", defaults.noise.octaves.count),
                    persistence: parsed(&conf, "Noise", "Persistence", defaults.noise.octaves.persistence),
                    lacunarity: parsed(&conf, "Noise", "Lacunarity", defaults.noise.octaves.lacunarity),
                },
            },
            keys: KeyConfig {
                primary: key(&conf, "Primary", defaults.keys.primary),
                secondary: key(&conf, "Secondary", defaults.keys.secondary),
                bindings,
            },
            organic_motion: flag(&conf, "Toggles", "OrganicMotion", defaults.organic_motion),
            debug_visuals: flag(&conf, "Toggles", "DebugVisuals", defaults.debug_visuals),
            mods: ActiveMods {
                hard_rock: flag(&conf, "Toggles", "HardRock", false),
                double_time: flag(&conf, "Toggles", "DoubleTime", false),
                nightcore: flag(&conf, "Toggles", "Nightcore", false),
            },
            osu_directory: raw(&conf, "Paths", "OsuDirectory").map(PathBuf::from),
            debug_window_title: raw(&conf, "Debug", "WindowTitle").unwrap_or_default(),
        }
    }
}
