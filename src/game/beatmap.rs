use crate::utils::math::Pos2;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingPoint {
    pub time: f64,
    /// Positive: uninherited (ms per beat). Negative: inherited, `-percentage`.
    pub beat_length: f64,
}

impl TimingPoint {
    #[inline(always)]
    pub fn is_uninherited(&self) -> bool {
        self.beat_length > 0.0
    }

    #[inline(always)]
    pub fn is_inherited(&self) -> bool {
        self.beat_length < 0.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurveType {
    Linear,
    PerfectCircle,
    Bezier,
}

impl CurveType {
    /// Catmull curves have no dedicated path model here and are sampled as Bezier.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'L' => Some(Self::Linear),
            'P' => Some(Self::PerfectCircle),
            'B' | 'C' => Some(Self::Bezier),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Slider {
    pub curve_type: CurveType,
    /// First point is the slider head (the object's own position).
    pub control_points: Vec<Pos2>,
    pub slides: u32,
    pub pixel_length: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HitObjectKind {
    Circle,
    Slider(Slider),
    Spinner { end_time: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HitObject {
    pub x: f64,
    pub y: f64,
    pub time: f64,
    pub kind: HitObjectKind,
}

impl HitObject {
    #[inline(always)]
    pub fn pos(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    #[inline(always)]
    pub fn is_circle(&self) -> bool {
        matches!(self.kind, HitObjectKind::Circle)
    }

    #[inline(always)]
    pub fn as_slider(&self) -> Option<&Slider> {
        match &self.kind {
            HitObjectKind::Slider(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            HitObjectKind::Circle => "circle",
            HitObjectKind::Slider(_) => "slider",
            HitObjectKind::Spinner { .. } => "spinner",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Difficulty {
    pub approach_rate: f64,
    pub overall_difficulty: f64,
    pub circle_size: f64,
    pub hp_drain_rate: f64,
    pub slider_multiplier: f64,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            approach_rate: 9.0,
            overall_difficulty: 5.0,
            circle_size: 4.0,
            hp_drain_rate: 5.0,
            slider_multiplier: 1.4,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct General {
    pub audio_lead_in: i32,
    pub values: HashMap<String, String>,
}

/// One parsed .osu difficulty. Hit objects and timing points are kept in
/// ascending time order; that order is the execution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Beatmap {
    pub general: General,
    pub difficulty: Difficulty,
    pub timing_points: Vec<TimingPoint>,
    pub hit_objects: Vec<HitObject>,
}

impl Beatmap {
    pub fn first_object(&self) -> Option<&HitObject> {
        self.hit_objects.first()
    }
}
