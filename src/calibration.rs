use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Settings {
    last_reaction_time_sec: f64,
}

pub fn load_reaction_time(path: &Path) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Settings>(&text) {
        Ok(s) if s.last_reaction_time_sec.is_finite() => {
            info!("Previous calibration loaded: {:.3}s", s.last_reaction_time_sec);
            Some(s.last_reaction_time_sec)
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Could not read calibration file '{}': {}", path.display(), e);
            None
        }
    }
}

pub fn save_reaction_time(path: &Path, secs: f64) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&Settings { last_reaction_time_sec: secs })
        .map_err(|e| format!("Could not encode calibration data: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Could not write '{}': {}", path.display(), e))?;
    info!("Calibration saved: {:.3}s", secs);
    Ok(())
}

#[inline(always)]
fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// The chosen value wins, then the previous one, then the default. Returns
/// the value to use and whether it is new and should be persisted.
pub fn resolve_reaction_time(previous: Option<f64>, chosen: Option<f64>, default: f64) -> (f64, bool) {
    match (chosen, previous) {
        (Some(c), Some(p)) => (c, !is_close(c, p)),
        (Some(c), None) => (c, true),
        (None, Some(p)) => (p, false),
        (None, None) => (default, false),
    }
}

/// Resolves the reaction time for this session, persisting new choices.
pub fn session_reaction_time(path: &Path, chosen: Option<f64>, default: f64) -> f64 {
    let (secs, is_new) = resolve_reaction_time(load_reaction_time(path), chosen, default);
    if is_new {
        if let Err(e) = save_reaction_time(path, secs) {
            warn!("{}", e);
        }
    }
    info!("Reaction time: {:.0}ms", secs * 1000.0);
    secs
}
