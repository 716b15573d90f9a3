//! Cursor paths between hit objects.
//!
//! A movement is a quadratic Bezier from the last cursor position to the next
//! target. The control point sits on the perpendicular through the midpoint;
//! how far off depends on the motion policy. Sampling eases progress with a
//! sine curve and adds low-amplitude Perlin jitter.

use crate::utils::math::{Pos2, ease_in_out_sine, quadratic_bezier};
use crate::utils::noise::{Octaves, Perlin1D};
use rand::Rng;
use std::f64::consts::TAU;

const DEFAULT_OFFSET_RATIO: f64 = 0.20;
const ORGANIC_OFFSET_RATIO: f64 = 0.40;
const ORGANIC_MIN_SHARE: f64 = 0.25;
/// Organic mode before any motion has happened in the run.
const ORGANIC_FIRST_OFFSET_RATIO: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseParams {
    /// Peak jitter in screen pixels.
    pub strength: f64,
    /// Noise-space distance covered over one whole movement.
    pub scale: f64,
    pub octaves: Octaves,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            scale: 10.0,
            octaves: Octaves { count: 2, persistence: 0.6, lacunarity: 2.0 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinnerParams {
    pub rpm: f64,
    /// osu! pixels; callers scale to the screen.
    pub radius: f64,
    pub radius_fluctuation: f64,
}

impl Default for SpinnerParams {
    fn default() -> Self {
        Self { rpm: 477.0, radius: 75.0, radius_fluctuation: 15.0 }
    }
}

// --- Control points ---

/// Midpoint pushed sideways by up to ±20% of the segment length.
pub fn default_control_point<R: Rng + ?Sized>(from: Pos2, to: Pos2, rng: &mut R) -> Pos2 {
    sideways_control_point(from, to, DEFAULT_OFFSET_RATIO, rng)
}

fn sideways_control_point<R: Rng + ?Sized>(from: Pos2, to: Pos2, ratio: f64, rng: &mut R) -> Pos2 {
    let midpoint = from.lerp(to, 0.5);
    let max_offset = from.distance(to) * ratio;
    if max_offset <= 0.0 {
        return midpoint;
    }
    let perp = (to - from).perp().normalize_or_zero();
    midpoint + perp * rng.random_range(-max_offset..=max_offset)
}

/// Curves along the flow of the previous movement. `incoming` is that
/// movement's vector; without it the offset is a symmetric ±25%.
pub fn organic_control_point<R: Rng + ?Sized>(
    from: Pos2,
    to: Pos2,
    incoming: Option<Pos2>,
    rng: &mut R,
) -> Pos2 {
    let outgoing = to - from;
    let dist = outgoing.length();
    let Some(incoming) = incoming.filter(|_| dist > 0.0) else {
        return sideways_control_point(from, to, ORGANIC_FIRST_OFFSET_RATIO, rng);
    };

    let unit_in = incoming.normalize_or_zero();
    let unit_out = outgoing.normalize_or_zero();
    let flow = unit_in + unit_out;
    let perp = if unit_in == Pos2::zero() || flow.length() == 0.0 {
        outgoing.perp() / dist
    } else {
        flow.perp().normalize_or_zero()
    };

    let max_offset = dist * ORGANIC_OFFSET_RATIO;
    let mut offset = rng.random_range(max_offset * ORGANIC_MIN_SHARE..=max_offset);
    if incoming.cross(outgoing) < 0.0 {
        offset = -offset;
    }
    from.lerp(to, 0.5) + perp * offset
}

pub fn control_point<R: Rng + ?Sized>(
    from: Pos2,
    to: Pos2,
    organic: bool,
    incoming: Option<Pos2>,
    rng: &mut R,
) -> Pos2 {
    if organic {
        organic_control_point(from, to, incoming, rng)
    } else {
        default_control_point(from, to, rng)
    }
}

// --- Jitter ---

/// Two independently seeded noise channels, fixed for a whole run.
#[derive(Clone, Debug)]
pub struct Jitter {
    x: Perlin1D,
    y: Perlin1D,
    params: NoiseParams,
}

impl Jitter {
    pub fn new<R: Rng + ?Sized>(params: NoiseParams, rng: &mut R) -> Self {
        Self {
            x: Perlin1D::new(rng.random_range(0..=1024)),
            y: Perlin1D::new(rng.random_range(0..=1024)),
            params,
        }
    }

    pub fn offset(&self, progress: f64) -> Pos2 {
        let input = progress * self.params.scale;
        Pos2::new(
            self.x.sample(input, self.params.octaves),
            self.y.sample(input, self.params.octaves),
        ) * self.params.strength
    }
}

// --- Motion sampling ---

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub from: Pos2,
    pub control: Pos2,
    pub to: Pos2,
    pub start: f64,
    /// Seconds; always positive for a sampled motion.
    pub budget: f64,
}

impl Motion {
    #[inline(always)]
    pub fn end(&self) -> f64 {
        self.start + self.budget
    }

    #[inline(always)]
    pub fn progress(&self, now: f64) -> f64 {
        if self.budget <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.budget).clamp(0.0, 1.0)
    }

    pub fn point_at(&self, progress: f64) -> Pos2 {
        quadratic_bezier(self.from, self.control, self.to, ease_in_out_sine(progress))
    }

    pub fn sample(&self, now: f64, jitter: Option<&Jitter>) -> Pos2 {
        let progress = self.progress(now);
        let point = self.point_at(progress);
        match jitter {
            Some(j) => point + j.offset(progress),
            None => point,
        }
    }
}

/// Linear sweep along `path`, `progress` in [0, 1].
pub fn polyline_point(path: &[Pos2], progress: f64) -> Option<Pos2> {
    let last = path.len().checked_sub(1)?;
    let scaled = progress.clamp(0.0, 1.0) * last as f64;
    let index = (scaled as usize).min(last);
    let next = (index + 1).min(last);
    Some(path[index].lerp(path[next], scaled - index as f64))
}

/// Point of slide `slide` (0-based) at `progress`; odd slides run backwards.
pub fn slide_point(path: &[(i32, i32)], slide: u32, progress: f64) -> Option<(i32, i32)> {
    let last = path.len().checked_sub(1)?;
    let index = (last as f64 * progress.clamp(0.0, 1.0)) as usize;
    let index = index.min(last);
    Some(if slide % 2 == 0 { path[index] } else { path[last - index] })
}

/// Where the cursor rests after all slides.
pub fn slider_end(path: &[(i32, i32)], slides: u32) -> Option<(i32, i32)> {
    if slides % 2 == 1 { path.last().copied() } else { path.first().copied() }
}

/// Constant angular rate, radius wobbling more as the spin goes on.
pub fn spinner_point<R: Rng + ?Sized>(
    center: Pos2,
    elapsed: f64,
    duration: f64,
    params: SpinnerParams,
    scale: f64,
    rng: &mut R,
) -> Pos2 {
    let angle = elapsed * (params.rpm / 60.0) * TAU;
    let progress = if duration > 0.0 { (elapsed / duration).min(1.0) } else { 1.0 };
    let fluctuation = params.radius_fluctuation;
    let wobble = if fluctuation > 0.0 { rng.random_range(-fluctuation..=fluctuation) } else { 0.0 };
    let radius = (params.radius + wobble * ease_in_out_sine(progress)) * scale;
    Pos2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Signed distance of `p` from the line through `a` and `b`.
    fn lateral(a: Pos2, b: Pos2, p: Pos2) -> f64 {
        (b - a).cross(p - a) / a.distance(b)
    }

    #[test]
    fn default_offset_stays_within_a_fifth_of_the_distance() {
        let (a, b) = (Pos2::new(0.0, 0.0), Pos2::new(300.0, 400.0));
        let mut rng = rng();
        for _ in 0..500 {
            let c = default_control_point(a, b, &mut rng);
            assert!(lateral(a, b, c).abs() <= 100.0 + 1e-9);
            // always on the perpendicular bisector
            assert!((c.distance(a) - c.distance(b)).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_length_segment_collapses_to_a_point() {
        let p = Pos2::new(50.0, 60.0);
        let mut rng = rng();
        assert_eq!(default_control_point(p, p, &mut rng), p);
        assert_eq!(organic_control_point(p, p, Some(Pos2::new(1.0, 0.0)), &mut rng), p);
        let motion = Motion { from: p, control: p, to: p, start: 0.0, budget: 1.0 };
        assert_eq!(motion.sample(0.5, None), p);
    }

    #[test]
    fn organic_curve_follows_the_turn_direction() {
        let from = Pos2::new(100.0, 100.0);
        let to = Pos2::new(200.0, 100.0);
        let mut rng = rng();
        // Incoming downward then heading right: cross < 0.
        let down = Pos2::new(0.0, 50.0);
        let up = Pos2::new(0.0, -50.0);
        let flow_down = (down.normalize_or_zero() + (to - from).normalize_or_zero()).perp().normalize_or_zero();
        let flow_up = (up.normalize_or_zero() + (to - from).normalize_or_zero()).perp().normalize_or_zero();
        for _ in 0..200 {
            let c = organic_control_point(from, to, Some(down), &mut rng);
            let d = (c - from.lerp(to, 0.5)).length();
            assert!((10.0 - 1e-9..=40.0 + 1e-9).contains(&d), "offset {d} outside 25%..100% of the ceiling");
            let along = (c - from.lerp(to, 0.5)).x * flow_down.x + (c - from.lerp(to, 0.5)).y * flow_down.y;
            assert!(along < 0.0);

            let c = organic_control_point(from, to, Some(up), &mut rng);
            let along = (c - from.lerp(to, 0.5)).x * flow_up.x + (c - from.lerp(to, 0.5)).y * flow_up.y;
            assert!(along > 0.0);
        }
    }

    #[test]
    fn organic_without_history_is_symmetric_quarter() {
        let (a, b) = (Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0));
        let mut rng = rng();
        let offsets: Vec<f64> = (0..300).map(|_| lateral(a, b, organic_control_point(a, b, None, &mut rng))).collect();
        assert!(offsets.iter().all(|o| o.abs() <= 25.0 + 1e-9));
        assert!(offsets.iter().any(|&o| o > 0.0) && offsets.iter().any(|&o| o < 0.0));
    }

    #[test]
    fn eased_motion_hits_both_endpoints() {
        let motion = Motion {
            from: Pos2::new(0.0, 0.0),
            control: Pos2::new(50.0, 80.0),
            to: Pos2::new(100.0, 0.0),
            start: 10.0,
            budget: 0.5,
        };
        assert_eq!(motion.sample(9.0, None), motion.from);
        assert_eq!(motion.sample(10.0, None), motion.from);
        assert!(motion.sample(10.5, None).distance(motion.to) < 1e-9);
        assert!(motion.sample(11.0, None).distance(motion.to) < 1e-9);
        // Sine easing lags linear progress early on.
        assert!(motion.sample(10.1, None).x < motion.point_at(0.2).x + 1e-9);
        assert!(motion.point_at(0.2).x < 20.0);
    }

    #[test]
    fn jitter_is_reproducible_and_small() {
        let params = NoiseParams { strength: 2.5, ..Default::default() };
        let a = Jitter::new(params, &mut StdRng::seed_from_u64(99));
        let b = Jitter::new(params, &mut StdRng::seed_from_u64(99));
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            assert_eq!(a.offset(p), b.offset(p));
            assert!(a.offset(p).length() <= 2.5 * 1.6 * 2.0_f64.sqrt() + 1e-9);
        }
        // zero at the lattice origin
        assert_eq!(a.offset(0.0), Pos2::zero());
    }

    #[test]
    fn polyline_sweep_interpolates_segments() {
        let path = [Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), Pos2::new(10.0, 10.0)];
        assert_eq!(polyline_point(&path, 0.0), Some(Pos2::new(0.0, 0.0)));
        assert_eq!(polyline_point(&path, 0.25), Some(Pos2::new(5.0, 0.0)));
        assert_eq!(polyline_point(&path, 0.75), Some(Pos2::new(10.0, 5.0)));
        assert_eq!(polyline_point(&path, 1.0), Some(Pos2::new(10.0, 10.0)));
        assert_eq!(polyline_point(&path, 3.0), Some(Pos2::new(10.0, 10.0)));
        assert_eq!(polyline_point(&[], 0.5), None);
    }

    #[test]
    fn slides_alternate_direction() {
        let path = [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)];
        assert_eq!(slide_point(&path, 0, 0.0), Some((0, 0)));
        assert_eq!(slide_point(&path, 0, 0.5), Some((2, 0)));
        assert_eq!(slide_point(&path, 0, 1.0), Some((4, 0)));
        assert_eq!(slide_point(&path, 1, 0.0), Some((4, 0)));
        assert_eq!(slide_point(&path, 1, 0.9), Some((1, 0)));
        assert_eq!(slider_end(&path, 1), Some((4, 0)));
        assert_eq!(slider_end(&path, 2), Some((0, 0)));
        assert_eq!(slider_end(&[], 3), None);
    }

    #[test]
    fn spinner_orbits_within_fluctuation() {
        let center = Pos2::new(960.0, 540.0);
        let params = SpinnerParams::default();
        let mut rng = rng();
        for i in 0..200 {
            let elapsed = i as f64 * 0.005;
            let p = spinner_point(center, elapsed, 1.0, params, 2.0, &mut rng);
            let r = p.distance(center);
            assert!((120.0 - 1e-9..=180.0 + 1e-9).contains(&r), "radius {r}");
        }
        // No wobble at the very start of the spin.
        let p = spinner_point(center, 0.0, 1.0, params, 1.0, &mut rng);
        assert!((p.distance(center) - 75.0).abs() < 1e-9);
        // 477 rpm: a quarter turn takes 60 / 477 / 4 seconds.
        let quarter = 60.0 / 477.0 / 4.0;
        let calm = SpinnerParams { radius_fluctuation: 0.0, ..params };
        let p = spinner_point(center, quarter, 10.0, calm, 1.0, &mut rng);
        assert!(p.distance(Pos2::new(960.0, 615.0)) < 1e-6);
    }
}
