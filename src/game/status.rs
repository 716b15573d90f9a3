use crate::game::beatmap::{Difficulty, HitObject};
use log::{debug, info};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PilotState {
    Idle = 0,
    Armed = 1,
    Running = 2,
}

impl PilotState {
    #[inline(always)]
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Armed,
            2 => Self::Running,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for PilotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Armed => "ARMED",
            Self::Running => "RUNNING",
        })
    }
}

/// Upcoming-object geometry, in screen pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum DebugShape {
    Circle { center: (i32, i32), radius: i32 },
    Slider { path: Vec<(i32, i32)> },
}

/// Everything the engine reports outward. All methods are fire-and-forget.
pub trait StatusSink {
    fn on_status_changed(&mut self, state: PilotState);
    fn on_beatmap_changed(&mut self, name: Option<&str>);
    fn on_difficulty_changed(&mut self, difficulty: Option<&Difficulty>);
    fn on_current_note_changed(&mut self, note: Option<(&HitObject, usize)>);
    fn on_debug_visuals_changed(&mut self, shapes: Option<&[DebugShape]>);
}

/// Reports through the logger. Status is only logged when it changes.
#[derive(Debug, Default)]
pub struct LogStatus {
    last_state: Option<PilotState>,
}

impl StatusSink for LogStatus {
    fn on_status_changed(&mut self, state: PilotState) {
        if self.last_state != Some(state) {
            info!("Status: {}", state);
            self.last_state = Some(state);
        }
    }

    fn on_beatmap_changed(&mut self, name: Option<&str>) {
        if let Some(name) = name {
            info!("Beatmap: {}", name);
        }
    }

    fn on_difficulty_changed(&mut self, difficulty: Option<&Difficulty>) {
        if let Some(d) = difficulty {
            info!(
                "AR: {:.1} | OD: {:.1} | CS: {:.1} | HP: {:.1}",
                d.approach_rate, d.overall_difficulty, d.circle_size, d.hp_drain_rate
            );
        }
    }

    fn on_current_note_changed(&mut self, note: Option<(&HitObject, usize)>) {
        if let Some((obj, index)) = note {
            debug!("Note {} ({}) at {}ms", index + 1, obj.kind_name(), obj.time);
        }
    }

    fn on_debug_visuals_changed(&mut self, shapes: Option<&[DebugShape]>) {
        if let Some(shapes) = shapes {
            for shape in shapes {
                match shape {
                    DebugShape::Circle { center, radius } => {
                        debug!("Upcoming circle at {:?} r={}", center, radius)
                    }
                    DebugShape::Slider { path } => debug!("Upcoming slider with {} points", path.len()),
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for s in [PilotState::Idle, PilotState::Armed, PilotState::Running] {
            assert_eq!(PilotState::from_u8(s as u8), s);
        }
        assert_eq!(PilotState::from_u8(200), PilotState::Idle);
        assert_eq!(PilotState::Running.to_string(), "RUNNING");
    }
}
