use crate::game::beatmap::{
    Beatmap, CurveType, Difficulty, General, HitObject, HitObjectKind, Slider, TimingPoint,
};
use crate::utils::math::Pos2;
use log::debug;
use std::fs;
use std::path::Path;

const TYPE_CIRCLE: u32 = 1;
const TYPE_SLIDER: u32 = 2;
const TYPE_SPINNER: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    General,
    Difficulty,
    TimingPoints,
    HitObjects,
    Other,
}

impl Section {
    fn from_header(name: &str) -> Self {
        match name {
            "General" => Self::General,
            "Difficulty" => Self::Difficulty,
            "TimingPoints" => Self::TimingPoints,
            "HitObjects" => Self::HitObjects,
            _ => Self::Other,
        }
    }
}

pub fn parse_osu_file(path: &Path) -> Result<Beatmap, String> {
    let bytes = fs::read(path).map_err(|e| format!("Could not read '{}': {}", path.display(), e))?;
    Ok(parse_osu_str(&String::from_utf8_lossy(&bytes)))
}

/// Best-effort: unparseable lines are skipped, never fatal.
pub fn parse_osu_str(text: &str) -> Beatmap {
    let mut beatmap = Beatmap::default();
    let mut section = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = Some(Section::from_header(&line[1..line.len() - 1]));
            continue;
        }

        match section {
            Some(Section::General) => parse_general_line(line, &mut beatmap.general),
            Some(Section::Difficulty) => parse_difficulty_line(line, &mut beatmap.difficulty),
            Some(Section::TimingPoints) => match parse_timing_point(line) {
                Some(tp) => beatmap.timing_points.push(tp),
                None => debug!("Skipping malformed timing point: '{}'", line),
            },
            Some(Section::HitObjects) => match parse_hit_object(line) {
                Some(obj) => beatmap.hit_objects.push(obj),
                None => debug!("Skipping malformed hit object: '{}'", line),
            },
            Some(Section::Other) | None => {}
        }
    }

    if !beatmap.timing_points.is_sorted_by(|a, b| a.time <= b.time) {
        beatmap.timing_points.sort_by(|a, b| a.time.total_cmp(&b.time));
    }
    if !beatmap.hit_objects.is_sorted_by(|a, b| a.time <= b.time) {
        beatmap.hit_objects.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    beatmap
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').map(|(k, v)| (k.trim(), v.trim()))
}

fn parse_general_line(line: &str, general: &mut General) {
    let Some((key, value)) = split_key_value(line) else { return };
    if key == "AudioLeadIn" {
        general.audio_lead_in = value.parse().unwrap_or(0);
    }
    general.values.insert(key.to_string(), value.to_string());
}

fn parse_difficulty_line(line: &str, difficulty: &mut Difficulty) {
    let Some((key, value)) = split_key_value(line) else { return };
    let Ok(v) = value.parse::<f64>() else {
        debug!("Non-numeric difficulty value {}={}", key, value);
        return;
    };
    match key {
        "ApproachRate" => difficulty.approach_rate = v,
        "OverallDifficulty" => difficulty.overall_difficulty = v,
        "CircleSize" => difficulty.circle_size = v,
        "HPDrainRate" => difficulty.hp_drain_rate = v,
        "SliderMultiplier" => difficulty.slider_multiplier = v,
        _ => {}
    }
}

fn parse_timing_point(line: &str) -> Option<TimingPoint> {
    let mut parts = line.split(',');
    let time = parts.next()?.trim().parse::<f64>().ok()?;
    let beat_length = parts.next()?.trim().parse::<f64>().ok()?;
    Some(TimingPoint { time, beat_length })
}

fn parse_hit_object(line: &str) -> Option<HitObject> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 4 {
        return None;
    }
    let x = parts[0].parse::<f64>().ok()?;
    let y = parts[1].parse::<f64>().ok()?;
    let time = parts[2].parse::<f64>().ok()?;
    let object_type = parts[3].parse::<u32>().ok()?;

    let kind = if object_type & TYPE_SPINNER != 0 {
        let end_time = parts.get(5)?.parse::<f64>().ok()?;
        HitObjectKind::Spinner { end_time }
    } else if object_type & TYPE_SLIDER != 0 {
        HitObjectKind::Slider(parse_slider(&parts, Pos2::new(x, y))?)
    } else if object_type & TYPE_CIRCLE != 0 {
        HitObjectKind::Circle
    } else {
        // mania holds and unknown bits
        return None;
    };

    Some(HitObject { x, y, time, kind })
}

fn parse_slider(parts: &[&str], head: Pos2) -> Option<Slider> {
    let mut curve = parts.get(5)?.split('|');
    let curve_type = CurveType::from_letter(curve.next()?.chars().next()?)?;

    let mut control_points = vec![head];
    for point in curve {
        let (px, py) = point.split_once(':')?;
        control_points.push(Pos2::new(px.parse().ok()?, py.parse().ok()?));
    }

    let slides = parts.get(6)?.parse::<u32>().ok()?.max(1);
    let pixel_length = parts.get(7)?.parse::<f64>().ok()?;

    Some(Slider { curve_type, control_points, slides, pixel_length })
}
