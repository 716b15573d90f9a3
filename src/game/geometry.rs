//! Slider path sampling and hold durations.
//!
//! Every function here is pure and total: malformed curve or timing data
//! produces an empty path or a zero duration, never an error. Callers treat an
//! empty path as "no movement for this object".

use crate::game::beatmap::{CurveType, Difficulty, Slider, TimingPoint};
use crate::utils::math::{Pos2, binomial};
use std::f64::consts::TAU;

pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Below this the three arc points are treated as a straight line.
const COLLINEAR_EPSILON: f64 = 1e-5;

pub type PixelPath = Vec<(i32, i32)>;

pub fn slider_path(slider: &Slider, sample_count: usize) -> PixelPath {
    let points = &slider.control_points;
    let samples = sample_count.max(1);
    match slider.curve_type {
        CurveType::Linear if points.len() == 2 => linear_path(points[0], points[1], samples),
        CurveType::Linear if points.len() > 2 => polyline_path(points, samples),
        CurveType::Linear => Vec::new(),
        CurveType::PerfectCircle if points.len() == 3 => {
            perfect_circle_path(points[0], points[1], points[2], samples)
        }
        CurveType::PerfectCircle | CurveType::Bezier => bezier_path(points, samples),
    }
}

fn linear_path(start: Pos2, end: Pos2, samples: usize) -> PixelPath {
    (0..=samples)
        .map(|i| start.lerp(end, i as f64 / samples as f64).to_pixel())
        .collect()
}

fn polyline_path(points: &[Pos2], samples: usize) -> PixelPath {
    let segments: Vec<Vec<Pos2>> = points.windows(2).map(|w| w.to_vec()).collect();
    sample_segments(&segments, points, samples)
}

fn perfect_circle_path(start: Pos2, mid: Pos2, end: Pos2, samples: usize) -> PixelPath {
    let cross = (mid - start).cross(end - start);
    if cross.abs() < COLLINEAR_EPSILON {
        return linear_path(start, end, samples);
    }

    let d = 2.0 * (start.x * (mid.y - end.y) + mid.x * (end.y - start.y) + end.x * (start.y - mid.y));
    if d.abs() < COLLINEAR_EPSILON {
        return Vec::new();
    }

    let s2 = start.x * start.x + start.y * start.y;
    let m2 = mid.x * mid.x + mid.y * mid.y;
    let e2 = end.x * end.x + end.y * end.y;
    let center = Pos2::new(
        (s2 * (mid.y - end.y) + m2 * (end.y - start.y) + e2 * (start.y - mid.y)) / d,
        (s2 * (end.x - mid.x) + m2 * (start.x - end.x) + e2 * (mid.x - start.x)) / d,
    );
    let radius = start.distance(center);

    let mut start_angle = (start.y - center.y).atan2(start.x - center.x);
    let mut end_angle = (end.y - center.y).atan2(end.x - center.x);

    // Sweep in the direction that passes through `mid`.
    if cross > 0.0 {
        if end_angle < start_angle {
            end_angle += TAU;
        }
    } else if start_angle < end_angle {
        start_angle += TAU;
    }

    (0..=samples)
        .map(|i| {
            let t = i as f64 / samples as f64;
            let angle = start_angle * (1.0 - t) + end_angle * t;
            Pos2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin()).to_pixel()
        })
        .collect()
}

/// Splits at consecutive duplicate points (red anchors). The shared anchor
/// ends one segment and starts the next.
pub fn split_bezier_segments(points: &[Pos2]) -> Vec<Vec<Pos2>> {
    let Some(&first) = points.first() else { return Vec::new() };
    let mut segments = Vec::new();
    let mut current = vec![first];
    let mut i = 1;
    while i < points.len() {
        current.push(points[i]);
        if i + 1 < points.len() && points[i] == points[i + 1] {
            segments.push(std::mem::replace(&mut current, vec![points[i + 1]]));
            i += 2;
        } else {
            i += 1;
        }
    }
    segments.push(current);
    segments
}

fn approximate_length(points: &[Pos2]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

fn bezier_point(points: &[Pos2], t: f64) -> Pos2 {
    let n = points.len() - 1;
    let mut acc = Pos2::zero();
    for (i, &p) in points.iter().enumerate() {
        let bernstein = binomial(n, i) * t.powi(i as i32) * (1.0 - t).powi((n - i) as i32);
        acc += p * bernstein;
    }
    acc
}

fn bezier_path(points: &[Pos2], samples: usize) -> PixelPath {
    if points.is_empty() {
        return Vec::new();
    }
    sample_segments(&split_bezier_segments(points), points, samples)
}

/// Samples per segment are proportional to approximate length (rounded).
/// All-zero length returns the raw control points unchanged.
fn sample_segments(segments: &[Vec<Pos2>], raw: &[Pos2], samples: usize) -> PixelPath {
    let lengths: Vec<f64> = segments.iter().map(|s| approximate_length(s)).collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 {
        return raw.iter().map(|p| p.to_pixel()).collect();
    }

    let mut path = Vec::with_capacity(samples + 1);
    for (segment, length) in segments.iter().zip(&lengths) {
        let count = (samples as f64 * (length / total)).round() as usize;
        if count == 0 {
            continue;
        }
        let denom = if count > 1 { (count - 1) as f64 } else { 1.0 };
        for j in 0..count {
            path.push(bezier_point(segment, j as f64 / denom).to_pixel());
        }
    }

    if let Some(&last) = raw.last() {
        let last = last.to_pixel();
        if path.last() != Some(&last) {
            path.push(last);
        }
    }
    path
}

/// Beat length in effect at `time`, scaled by the latest inherited
/// velocity point at or before it. `None` without an uninherited point.
fn effective_beat_length(time: f64, timing_points: &[TimingPoint]) -> Option<f64> {
    let mut beat_length = None;
    for tp in timing_points {
        if tp.time > time {
            break;
        }
        if tp.is_uninherited() {
            beat_length = Some(tp.beat_length);
        }
    }
    let mut beat_length = beat_length?;

    if let Some(inherited) = timing_points.iter().rev().find(|tp| tp.time <= time && tp.is_inherited()) {
        beat_length *= -inherited.beat_length / 100.0;
    }
    Some(beat_length)
}

/// Total hold time for all slides combined, in ms. Divide by `slides` for
/// one traversal.
pub fn slider_duration(time: f64, slider: &Slider, difficulty: &Difficulty, timing_points: &[TimingPoint]) -> f64 {
    let Some(beat_length) = effective_beat_length(time, timing_points) else {
        return 0.0;
    };
    if difficulty.slider_multiplier <= 0.0 {
        return 0.0;
    }
    (slider.pixel_length / (100.0 * difficulty.slider_multiplier)) * beat_length * slider.slides as f64
}
