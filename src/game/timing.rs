/// How long before its hit time an object starts fading in.
#[inline(always)]
pub fn ar_fade_in_ms(ar: f64) -> f64 {
    if ar < 5.0 {
        1200.0 + 600.0 * (5.0 - ar) / 5.0
    } else if ar == 5.0 {
        1200.0
    } else {
        1200.0 - 750.0 * (ar - 5.0) / 5.0
    }
}

/// Linear map from song time (ms) to wall-clock seconds, fixed for one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncAnchor {
    /// Wall-clock second at which song time zero happened.
    pub start_time: f64,
    pub offset_ms: f64,
}

impl SyncAnchor {
    /// The user presses the sync key when the first object becomes visible,
    /// `reaction_time` seconds after it actually appeared.
    pub fn from_keypress(
        keypress_time: f64,
        reaction_time: f64,
        first_object_ms: f64,
        approach_rate: f64,
        offset_ms: f64,
    ) -> Self {
        let song_time_at_keypress = (first_object_ms - ar_fade_in_ms(approach_rate)) / 1000.0;
        let appeared_at = keypress_time - reaction_time;
        Self { start_time: appeared_at - song_time_at_keypress, offset_ms }
    }

    #[inline(always)]
    pub fn deadline(&self, object_time_ms: f64) -> f64 {
        self.start_time + object_time_ms / 1000.0 + self.offset_ms / 1000.0
    }
}
