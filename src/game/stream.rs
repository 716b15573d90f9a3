use crate::game::beatmap::HitObject;

pub const STREAM_TIME_THRESHOLD_MS: f64 = 200.0;
pub const STREAM_DISTANCE_THRESHOLD: f64 = 150.0;
pub const STREAM_MIN_NOTES: usize = 3;
pub const STREAM_LOOK_AHEAD: usize = 7;

#[inline(always)]
fn is_stream_pair(a: &HitObject, b: &HitObject) -> bool {
    a.is_circle()
        && b.is_circle()
        && b.time - a.time <= STREAM_TIME_THRESHOLD_MS
        && a.pos().distance(b.pos()) <= STREAM_DISTANCE_THRESHOLD
}

/// Longest run of dense circles starting at `start`, bounded by the lookahead.
/// Returns the slice only when it holds at least `STREAM_MIN_NOTES` objects.
pub fn find_stream_group(objects: &[HitObject], start: usize) -> Option<&[HitObject]> {
    if start + STREAM_MIN_NOTES > objects.len() {
        return None;
    }

    let last_pair = (objects.len() - 1).min(start + STREAM_LOOK_AHEAD);
    let mut end = start;
    for i in start..last_pair {
        if !is_stream_pair(&objects[i], &objects[i + 1]) {
            break;
        }
        end = i + 1;
    }

    let len = end - start + 1;
    (end > start && len >= STREAM_MIN_NOTES).then(|| &objects[start..=end])
}
