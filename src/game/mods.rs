use crate::core::space::PLAYFIELD_HEIGHT;
use crate::game::beatmap::{Beatmap, HitObjectKind};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

const SPEED_UP_RATE: f64 = 1.5;

/// Gameplay mod toggles. Shared with the hotkey listener; a beatmap only sees
/// the snapshot taken by `apply` at load time.
#[derive(Debug, Default)]
pub struct ModHandler {
    hard_rock: AtomicBool,
    double_time: AtomicBool,
    nightcore: AtomicBool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveMods {
    pub hard_rock: bool,
    pub double_time: bool,
    pub nightcore: bool,
}

impl ActiveMods {
    #[inline(always)]
    pub fn speeds_up(&self) -> bool {
        self.double_time || self.nightcore
    }

    pub fn label(&self) -> String {
        let mut names = Vec::new();
        if self.hard_rock {
            names.push("HR");
        }
        if self.double_time {
            names.push("DT");
        }
        if self.nightcore {
            names.push("NC");
        }
        if names.is_empty() { "NM".to_string() } else { names.join(",") }
    }
}

impl ModHandler {
    pub fn new(initial: ActiveMods) -> Self {
        let handler = Self::default();
        handler.hard_rock.store(initial.hard_rock, Ordering::Relaxed);
        handler.double_time.store(initial.double_time, Ordering::Relaxed);
        // DT wins if a config enables both.
        handler.nightcore.store(initial.nightcore && !initial.double_time, Ordering::Relaxed);
        handler
    }

    pub fn active(&self) -> ActiveMods {
        ActiveMods {
            hard_rock: self.hard_rock.load(Ordering::Relaxed),
            double_time: self.double_time.load(Ordering::Relaxed),
            nightcore: self.nightcore.load(Ordering::Relaxed),
        }
    }

    pub fn toggle_hard_rock(&self) -> bool {
        let now = !self.hard_rock.fetch_xor(true, Ordering::Relaxed);
        info!("HR mod {}", if now { "ACTIVATED" } else { "DEACTIVATED" });
        now
    }

    pub fn toggle_double_time(&self) -> bool {
        let now = !self.double_time.fetch_xor(true, Ordering::Relaxed);
        if now {
            self.nightcore.store(false, Ordering::Relaxed);
        }
        info!("DT mod {}", if now { "ACTIVATED" } else { "DEACTIVATED" });
        now
    }

    pub fn toggle_nightcore(&self) -> bool {
        let now = !self.nightcore.fetch_xor(true, Ordering::Relaxed);
        if now {
            self.double_time.store(false, Ordering::Relaxed);
        }
        info!("NC mod {}", if now { "ACTIVATED" } else { "DEACTIVATED" });
        now
    }

    /// Returns a transformed copy; the input is never modified.
    pub fn apply(&self, original: &Beatmap) -> Beatmap {
        apply_mods(original, self.active())
    }
}

pub fn apply_mods(original: &Beatmap, mods: ActiveMods) -> Beatmap {
    let mut data = original.clone();
    if mods == ActiveMods::default() {
        return data;
    }
    info!("Applying mods: {}", mods.label());

    if mods.hard_rock {
        flip_vertical(&mut data);
    }
    if mods.speeds_up() {
        speed_up(&mut data, SPEED_UP_RATE);
    }
    data
}

fn flip_vertical(data: &mut Beatmap) {
    for obj in &mut data.hit_objects {
        obj.y = PLAYFIELD_HEIGHT - obj.y;
        if let HitObjectKind::Slider(slider) = &mut obj.kind {
            for p in &mut slider.control_points {
                p.y = PLAYFIELD_HEIGHT - p.y;
            }
        }
    }
}

#[inline(always)]
fn ar_to_preempt_ms(ar: f64) -> f64 {
    if ar <= 5.0 { 1800.0 - 120.0 * ar } else { 1200.0 - 150.0 * (ar - 5.0) }
}

#[inline(always)]
fn preempt_ms_to_ar(ms: f64) -> f64 {
    if ms > 1200.0 { (1800.0 - ms) / 120.0 } else { 5.0 + (1200.0 - ms) / 150.0 }
}

#[inline(always)]
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn speed_up(data: &mut Beatmap, rate: f64) {
    for obj in &mut data.hit_objects {
        obj.time = (obj.time / rate).trunc();
        if let HitObjectKind::Spinner { end_time } = &mut obj.kind {
            *end_time = (*end_time / rate).trunc();
        }
    }
    for tp in &mut data.timing_points {
        tp.time = (tp.time / rate).trunc();
        if tp.is_uninherited() {
            tp.beat_length /= rate;
        }
    }

    let diff = &mut data.difficulty;
    diff.approach_rate = round2(preempt_ms_to_ar(ar_to_preempt_ms(diff.approach_rate) / rate));
    let window_300_ms = 79.5 - 6.0 * diff.overall_difficulty;
    diff.overall_difficulty = round2((79.5 - window_300_ms / rate) / 6.0);
}
