//! Execution engine.
//!
//! Idle watches the foreground window for a playable beatmap, Armed waits
//! for the sync keypress, Running replays the beatmap against wall-clock
//! deadlines fixed by that keypress. Every inner loop polls the shared stop
//! flag so a cancel lands within one sampling tick.

use crate::config::{
    CIRCLE_HOLD_SECS, Config, DEBUG_CIRCLE_BASE_RADIUS, DEBUG_CIRCLE_RADIUS_STEP, DEBUG_LOOKAHEAD_OBJECTS,
    DIRECTORY_BACKOFF_SECS, MIN_MOVE_BUDGET_SECS, POLL_INTERVAL_SECS, SAMPLE_SLEEP_SECS,
};
use crate::core::clock::Clock;
use crate::core::input::{InputSink, Key, Signals, Toggles, WindowProbe};
use crate::core::space::{PLAYFIELD_CENTER, Playfield};
use crate::game::beatmap::{Beatmap, HitObject, HitObjectKind, Slider};
use crate::game::geometry::{DEFAULT_SAMPLE_COUNT, slider_duration, slider_path};
use crate::game::mods::ModHandler;
use crate::game::parsing::locate::{BeatmapSource, beatmap_title_from_window};
use crate::game::status::{DebugShape, PilotState, StatusSink};
use crate::game::stream::find_stream_group;
use crate::game::timing::{SyncAnchor, ar_fade_in_ms};
use crate::game::trajectory::{
    Jitter, Motion, NoiseParams, SpinnerParams, control_point, default_control_point, polyline_point,
    slide_point, slider_end, spinner_point,
};
use crate::utils::math::Pos2;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    Stopped,
}

/// Early-return from the enclosing function when a step was interrupted.
macro_rules! stop_on_cancel {
    ($step:expr) => {
        if $step == Outcome::Stopped {
            return Ok(Outcome::Stopped);
        }
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct PilotSettings {
    pub reaction_time: f64,
    pub offset_ms: f64,
    pub primary_key: Key,
    pub secondary_key: Key,
    pub noise: NoiseParams,
    pub spinner: SpinnerParams,
}

impl PilotSettings {
    pub fn from_config(config: &Config, reaction_time: f64) -> Self {
        Self {
            reaction_time,
            offset_ms: config.offset_ms,
            primary_key: config.keys.primary,
            secondary_key: config.keys.secondary,
            noise: config.noise,
            spinner: config.spinner,
        }
    }
}

/// Per-run external collaborators.
pub struct Collaborators {
    pub input: Box<dyn InputSink>,
    pub probe: Box<dyn WindowProbe>,
    pub source: Box<dyn BeatmapSource>,
    pub status: Box<dyn StatusSink>,
}

/// State shared with the hotkey listener.
#[derive(Clone)]
pub struct Shared {
    pub clock: Arc<dyn Clock>,
    pub signals: Arc<Signals>,
    pub toggles: Arc<Toggles>,
    pub mods: Arc<ModHandler>,
}

/// Cursor bookkeeping carried from one object to the next.
struct RunState {
    cursor: Pos2,
    last_action: f64,
    /// Vector of the last movement, for organic curves.
    incoming: Option<Pos2>,
    use_primary: bool,
    jitter: Jitter,
}

pub struct Pilot {
    settings: PilotSettings,
    input: Box<dyn InputSink>,
    probe: Box<dyn WindowProbe>,
    source: Box<dyn BeatmapSource>,
    status: Box<dyn StatusSink>,
    shared: Shared,
    rng: StdRng,
    playfield: Playfield,

    state: PilotState,
    beatmap: Option<Beatmap>,
    last_title: Option<String>,
    backoff_until: Option<f64>,
    held: Vec<Key>,
}

impl Pilot {
    pub fn new(settings: PilotSettings, parts: Collaborators, shared: Shared, rng: StdRng) -> Self {
        let (w, h) = parts.input.screen_size();
        let playfield = Playfield::for_screen(w, h);
        debug!(
            "Playfield {}x{} at ({}, {})",
            playfield.width, playfield.height, playfield.x_offset, playfield.y_offset
        );
        shared.signals.publish_state(PilotState::Idle);
        Self {
            settings,
            input: parts.input,
            probe: parts.probe,
            source: parts.source,
            status: parts.status,
            shared,
            rng,
            playfield,
            state: PilotState::Idle,
            beatmap: None,
            last_title: None,
            backoff_until: None,
            held: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> PilotState {
        self.state
    }

    /// Polls until shutdown. An `Err` is a fault while driving input; every
    /// held key has been released by then.
    pub fn run(&mut self) -> Result<(), String> {
        info!("Pilot running. Waiting for a beatmap...");
        while !self.shared.signals.shutdown_requested() {
            self.step()?;
            self.shared.clock.sleep(POLL_INTERVAL_SECS);
        }
        info!("Pilot stopped.");
        Ok(())
    }

    /// One poll of the state machine. Running happens entirely inside the
    /// Armed step that consumed the sync request.
    pub fn step(&mut self) -> Result<(), String> {
        self.status.on_status_changed(self.state);
        match self.state {
            PilotState::Idle => {
                self.handle_idle();
                Ok(())
            }
            PilotState::Armed => self.handle_armed(),
            PilotState::Running => Ok(()),
        }
    }

    fn transition(&mut self, state: PilotState) {
        if self.state != state {
            info!("{} -> {}", self.state, state);
        }
        self.state = state;
        self.shared.signals.publish_state(state);
        self.status.on_status_changed(state);
    }

    fn reset_to_idle(&mut self) {
        self.status.on_debug_visuals_changed(None);
        self.status.on_current_note_changed(None);
        self.beatmap = None;
        self.last_title = None;
        self.status.on_beatmap_changed(None);
        self.status.on_difficulty_changed(None);
        self.transition(PilotState::Idle);
        // Only after Idle is published, so no late cancel slips past.
        self.shared.signals.clear_requests();
    }

    // --- Idle / Armed ---

    fn handle_idle(&mut self) {
        if let Some(until) = self.backoff_until {
            if self.shared.clock.now() < until {
                return;
            }
            self.backoff_until = None;
        }

        let title = self.probe.foreground_title();
        let Some(beatmap_title) = beatmap_title_from_window(&title) else { return };
        if self.last_title.as_deref() == Some(beatmap_title) {
            return;
        }
        self.last_title = Some(beatmap_title.to_string());

        match self.source.locate_and_parse(beatmap_title) {
            Ok(original) => {
                let beatmap = self.shared.mods.apply(&original);
                info!("Loaded {} hit objects for '{}'", beatmap.hit_objects.len(), beatmap_title);
                self.status.on_beatmap_changed(Some(beatmap_title));
                self.status.on_difficulty_changed(Some(&beatmap.difficulty));
                self.beatmap = Some(beatmap);
                self.transition(PilotState::Armed);
            }
            Err(e) if e.is_directory_missing() => {
                warn!("{}; retrying in {}s", e, DIRECTORY_BACKOFF_SECS);
                self.status.on_beatmap_changed(Some(&e.to_string()));
                self.status.on_difficulty_changed(None);
                self.last_title = None;
                self.backoff_until = Some(self.shared.clock.now() + DIRECTORY_BACKOFF_SECS);
            }
            Err(e) => {
                warn!("{}", e);
                self.status.on_beatmap_changed(Some("Beatmap file not found."));
                self.status.on_difficulty_changed(None);
            }
        }
    }

    fn handle_armed(&mut self) -> Result<(), String> {
        let title = self.probe.foreground_title();
        if beatmap_title_from_window(&title).is_none() {
            info!("Beatmap window lost, disarming.");
            self.reset_to_idle();
            return Ok(());
        }

        let Some(pressed_at) = self.shared.signals.take_sync() else { return Ok(()) };
        let Some(beatmap) = self.beatmap.take() else {
            self.reset_to_idle();
            return Ok(());
        };
        let Some(first) = beatmap.first_object() else {
            self.reset_to_idle();
            return Ok(());
        };

        let ar = beatmap.difficulty.approach_rate;
        let anchor =
            SyncAnchor::from_keypress(pressed_at, self.settings.reaction_time, first.time, ar, self.settings.offset_ms);
        info!(
            "Sync at {:.3}s: fade-in {:.0}ms, reaction {:.0}ms, start {:.3}s",
            pressed_at,
            ar_fade_in_ms(ar),
            self.settings.reaction_time * 1000.0,
            anchor.start_time
        );

        let result = self.execute(&beatmap, anchor);
        self.reset_to_idle();
        result
    }

    // --- Running ---

    fn execute(&mut self, beatmap: &Beatmap, anchor: SyncAnchor) -> Result<(), String> {
        self.transition(PilotState::Running);
        let played = self.play(beatmap, anchor);
        let released = self.release_all();
        self.status.on_debug_visuals_changed(None);
        self.status.on_current_note_changed(None);

        match played? {
            Outcome::Done => info!("Beatmap finished!"),
            Outcome::Stopped => info!("Run cancelled, all keys released."),
        }
        released
    }

    fn play(&mut self, beatmap: &Beatmap, anchor: SyncAnchor) -> Result<Outcome, String> {
        let mut run = RunState {
            cursor: Pos2::from(self.input.pointer_position()?),
            last_action: self.shared.clock.now(),
            incoming: None,
            use_primary: true,
            jitter: Jitter::new(self.settings.noise, &mut self.rng),
        };

        let objects = &beatmap.hit_objects;
        let mut index = 0;
        while index < objects.len() {
            stop_on_cancel!(self.check_stop());
            self.status.on_status_changed(PilotState::Running);

            if let Some(group) = find_stream_group(objects, index) {
                stop_on_cancel!(self.play_stream(group, index, anchor, &mut run)?);
                index += group.len();
                continue;
            }

            stop_on_cancel!(self.play_object(beatmap, index, anchor, &mut run)?);
            index += 1;
        }
        Ok(Outcome::Done)
    }

    fn play_object(
        &mut self,
        beatmap: &Beatmap,
        index: usize,
        anchor: SyncAnchor,
        run: &mut RunState,
    ) -> Result<Outcome, String> {
        let obj = &beatmap.hit_objects[index];
        self.status.on_current_note_changed(Some((obj, index)));

        let deadline = anchor.deadline(obj.time);
        let target = self.playfield.to_screen(obj.x, obj.y);
        let to = Pos2::from(target);
        let from = run.cursor;
        let control = control_point(from, to, self.shared.toggles.organic_motion(), run.incoming, &mut self.rng);
        self.publish_debug_visuals(beatmap, index);

        let budget = deadline - run.last_action;
        if budget > MIN_MOVE_BUDGET_SECS {
            let motion = Motion { from, control, to, start: run.last_action, budget };
            stop_on_cancel!(self.sweep(&motion, Some(&run.jitter))?);
        }
        stop_on_cancel!(self.check_stop());

        self.input.move_pointer_to(target.0, target.1)?;
        stop_on_cancel!(self.wait_until(deadline));

        if to != from {
            run.incoming = Some(to - from);
        }
        let key = self.current_key(run);
        run.cursor = match &obj.kind {
            HitObjectKind::Circle => {
                self.tap(key)?;
                to
            }
            HitObjectKind::Slider(slider) => match self.slide(obj, slider, beatmap, key)? {
                (Outcome::Done, end) => end.unwrap_or(to),
                (Outcome::Stopped, _) => return Ok(Outcome::Stopped),
            },
            HitObjectKind::Spinner { end_time } => {
                stop_on_cancel!(self.spin(obj.time, *end_time, key)?);
                self.playfield.to_screen_pos(PLAYFIELD_CENTER)
            }
        };

        run.last_action = self.shared.clock.now();
        run.use_primary = !run.use_primary;
        Ok(Outcome::Done)
    }

    fn slide(
        &mut self,
        obj: &HitObject,
        slider: &Slider,
        beatmap: &Beatmap,
        key: Key,
    ) -> Result<(Outcome, Option<Pos2>), String> {
        let path = slider_path(slider, DEFAULT_SAMPLE_COUNT);
        if path.is_empty() {
            debug!("Slider at {}ms has no usable path, skipping", obj.time);
            return Ok((Outcome::Done, None));
        }
        let slides = slider.slides.max(1);
        let total_ms = slider_duration(obj.time, slider, &beatmap.difficulty, &beatmap.timing_points);
        let per_slide = total_ms / slides as f64 / 1000.0;

        self.press(key)?;
        for slide in 0..slides {
            if self.check_stop() == Outcome::Stopped {
                self.release(key)?;
                return Ok((Outcome::Stopped, None));
            }
            let start = self.shared.clock.now();
            loop {
                let now = self.shared.clock.now();
                if now >= start + per_slide {
                    break;
                }
                if self.check_stop() == Outcome::Stopped {
                    self.release(key)?;
                    return Ok((Outcome::Stopped, None));
                }
                let progress = if per_slide > 0.0 { (now - start) / per_slide } else { 1.0 };
                if let Some((px, py)) = slide_point(&path, slide, progress) {
                    let (sx, sy) = self.playfield.to_screen(px as f64, py as f64);
                    self.input.move_pointer_to(sx, sy)?;
                }
                self.shared.clock.sleep(SAMPLE_SLEEP_SECS);
            }
        }
        self.release(key)?;

        let end = slider_end(&path, slides).map(|(x, y)| self.playfield.to_screen_pos(Pos2::from((x, y))));
        Ok((Outcome::Done, end))
    }

    fn spin(&mut self, start_ms: f64, end_ms: f64, key: Key) -> Result<Outcome, String> {
        let duration = (end_ms - start_ms) / 1000.0;
        let center = self.playfield.to_screen_pos(PLAYFIELD_CENTER);
        let scale = self.playfield.scale();

        self.press(key)?;
        let start = self.shared.clock.now();
        loop {
            let elapsed = self.shared.clock.now() - start;
            if elapsed >= duration {
                break;
            }
            if self.check_stop() == Outcome::Stopped {
                self.release(key)?;
                return Ok(Outcome::Stopped);
            }
            let p = spinner_point(center, elapsed, duration, self.settings.spinner, scale, &mut self.rng);
            self.input.move_pointer_to(p.x as i32, p.y as i32)?;
            self.shared.clock.sleep(SAMPLE_SLEEP_SECS);
        }
        self.release(key)?;
        Ok(Outcome::Done)
    }

    /// Sweeps the whole group as one polyline while firing each note's key
    /// on its own deadline.
    fn play_stream(
        &mut self,
        group: &[HitObject],
        first_index: usize,
        anchor: SyncAnchor,
        run: &mut RunState,
    ) -> Result<Outcome, String> {
        info!("Stream detected with {} notes. Executing.", group.len());
        let Some((first, last)) = group.first().zip(group.last()) else { return Ok(Outcome::Done) };
        let stream_start = anchor.deadline(first.time);
        let total = anchor.deadline(last.time) - stream_start;
        let polyline: Vec<Pos2> = group.iter().map(|o| self.playfield.to_screen_pos(o.pos())).collect();

        let entry_budget = stream_start - self.shared.clock.now();
        if entry_budget > MIN_MOVE_BUDGET_SECS {
            let to = polyline[0];
            let control = default_control_point(run.cursor, to, &mut self.rng);
            let motion =
                Motion { from: run.cursor, control, to, start: self.shared.clock.now(), budget: entry_budget };
            stop_on_cancel!(self.sweep(&motion, None)?);
        }

        let sweep_start = self.shared.clock.now();
        let mut next = 0;
        loop {
            let now = self.shared.clock.now();
            if now >= sweep_start + total {
                break;
            }
            stop_on_cancel!(self.check_stop());

            let progress = if total > 0.0 { (now - sweep_start) / total } else { 1.0 };
            if let Some(p) = polyline_point(&polyline, progress) {
                self.input.move_pointer_to(p.x as i32, p.y as i32)?;
            }
            if next < group.len() && now >= anchor.deadline(group[next].time) {
                self.tap_stream_note(group, first_index, next, run)?;
                next += 1;
            }
            self.shared.clock.sleep(SAMPLE_SLEEP_SECS);
        }

        // Deadlines the sweep ran past without firing.
        while next < group.len() {
            stop_on_cancel!(self.wait_until(anchor.deadline(group[next].time)));
            self.tap_stream_note(group, first_index, next, run)?;
            next += 1;
        }

        let n = polyline.len();
        run.cursor = polyline[n - 1];
        if n >= 2 {
            run.incoming = Some(polyline[n - 1] - polyline[n - 2]);
        }
        run.last_action = self.shared.clock.now();
        Ok(Outcome::Done)
    }

    fn tap_stream_note(
        &mut self,
        group: &[HitObject],
        first_index: usize,
        offset: usize,
        run: &mut RunState,
    ) -> Result<(), String> {
        self.status.on_current_note_changed(Some((&group[offset], first_index + offset)));
        let key = self.current_key(run);
        self.tap(key)?;
        run.use_primary = !run.use_primary;
        Ok(())
    }

    // --- Debug visuals ---

    fn publish_debug_visuals(&mut self, beatmap: &Beatmap, index: usize) {
        if !self.shared.toggles.debug_visuals() {
            self.status.on_debug_visuals_changed(None);
            return;
        }
        let shapes: Vec<DebugShape> = (1..=DEBUG_LOOKAHEAD_OBJECTS)
            .filter_map(|i| beatmap.hit_objects.get(index + i).map(|obj| (i, obj)))
            .map(|(i, obj)| match obj.as_slider() {
                Some(slider) => DebugShape::Slider {
                    path: slider_path(slider, DEFAULT_SAMPLE_COUNT)
                        .into_iter()
                        .map(|(x, y)| self.playfield.to_screen(x as f64, y as f64))
                        .collect(),
                },
                None => DebugShape::Circle {
                    center: self.playfield.to_screen(obj.x, obj.y),
                    radius: DEBUG_CIRCLE_BASE_RADIUS - i as i32 * DEBUG_CIRCLE_RADIUS_STEP,
                },
            })
            .collect();
        self.status.on_debug_visuals_changed(Some(&shapes));
    }

    // --- Primitives ---

    #[inline(always)]
    fn check_stop(&self) -> Outcome {
        if self.shared.signals.should_stop() { Outcome::Stopped } else { Outcome::Done }
    }

    #[inline(always)]
    fn current_key(&self, run: &RunState) -> Key {
        if run.use_primary { self.settings.primary_key } else { self.settings.secondary_key }
    }

    /// Samples `motion` until its budget is spent.
    fn sweep(&mut self, motion: &Motion, jitter: Option<&Jitter>) -> Result<Outcome, String> {
        loop {
            let now = self.shared.clock.now();
            if now >= motion.end() {
                return Ok(Outcome::Done);
            }
            stop_on_cancel!(self.check_stop());
            let p = motion.sample(now, jitter);
            self.input.move_pointer_to(p.x as i32, p.y as i32)?;
            self.shared.clock.sleep(SAMPLE_SLEEP_SECS);
        }
    }

    /// Spins without sleeping; deadline precision beats CPU time here.
    fn wait_until(&self, deadline: f64) -> Outcome {
        while self.shared.clock.now() < deadline {
            if self.shared.signals.should_stop() {
                return Outcome::Stopped;
            }
            std::hint::spin_loop();
        }
        Outcome::Done
    }

    fn press(&mut self, key: Key) -> Result<(), String> {
        self.input.key_down(key)?;
        self.held.push(key);
        Ok(())
    }

    fn release(&mut self, key: Key) -> Result<(), String> {
        self.held.retain(|k| *k != key);
        self.input.key_up(key)
    }

    fn tap(&mut self, key: Key) -> Result<(), String> {
        self.press(key)?;
        self.shared.clock.sleep(CIRCLE_HOLD_SECS);
        self.release(key)
    }

    /// Releases everything still held, reporting the first failure.
    fn release_all(&mut self) -> Result<(), String> {
        let mut first_err = None;
        for key in std::mem::take(&mut self.held) {
            if let Err(e) = self.input.key_up(key) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::manual::ManualClock;
    use crate::game::beatmap::{CurveType, Difficulty, TimingPoint};
    use crate::game::mods::ActiveMods;
    use crate::game::parsing::locate::LocateError;
    use crate::game::status::recording::RecordingStatus;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TITLE: &str = "osu!  - Artist - Song [Hard]";
    const S: Key = Key::Char('s');
    const A: Key = Key::Char('a');

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct KeyEvent {
        down: bool,
        key: Key,
        at: f64,
        pointer: (i32, i32),
    }

    #[derive(Default)]
    struct InputLog {
        moves: usize,
        pointer: (i32, i32),
        events: Vec<KeyEvent>,
    }

    /// Scripted interruptions, counted in pointer moves (1-based).
    #[derive(Clone, Copy, Debug, Default)]
    struct Script {
        cancel_on_move: Option<usize>,
        cancel_on_held_move: Option<usize>,
        fail_on_held_move: Option<usize>,
        cancel_during_reset: bool,
    }

    struct FakeInput {
        log: Arc<Mutex<InputLog>>,
        clock: Arc<ManualClock>,
        signals: Arc<Signals>,
        script: Script,
        held_moves: usize,
    }

    impl InputSink for FakeInput {
        fn move_pointer_to(&mut self, x: i32, y: i32) -> Result<(), String> {
            let mut log = self.log.lock().unwrap();
            log.moves += 1;
            log.pointer = (x, y);
            let moves = log.moves;
            let held = log.events.iter().filter(|e| e.down).count() > log.events.iter().filter(|e| !e.down).count();
            drop(log);
            if Some(moves) == self.script.cancel_on_move {
                self.signals.request_cancel();
            }
            if held {
                self.held_moves += 1;
                if Some(self.held_moves) == self.script.fail_on_held_move {
                    return Err("pointer device lost".to_string());
                }
                if Some(self.held_moves) == self.script.cancel_on_held_move {
                    self.signals.request_cancel();
                }
            }
            Ok(())
        }

        fn key_down(&mut self, key: Key) -> Result<(), String> {
            let mut log = self.log.lock().unwrap();
            let pointer = log.pointer;
            log.events.push(KeyEvent { down: true, key, at: self.clock.peek(), pointer });
            Ok(())
        }

        fn key_up(&mut self, key: Key) -> Result<(), String> {
            let mut log = self.log.lock().unwrap();
            let pointer = log.pointer;
            log.events.push(KeyEvent { down: false, key, at: self.clock.peek(), pointer });
            Ok(())
        }

        fn pointer_position(&self) -> Result<(i32, i32), String> {
            Ok(self.log.lock().unwrap().pointer)
        }

        fn screen_size(&self) -> (u32, u32) {
            (1920, 1080)
        }
    }

    struct FakeProbe(Arc<Mutex<String>>);

    impl WindowProbe for FakeProbe {
        fn foreground_title(&self) -> String {
            self.0.lock().unwrap().clone()
        }
    }

    /// Presses cancel while the engine reports its own reset.
    struct CancelDuringReset {
        inner: RecordingStatus,
        signals: Arc<Signals>,
    }

    impl StatusSink for CancelDuringReset {
        fn on_status_changed(&mut self, state: PilotState) {
            self.inner.on_status_changed(state);
        }

        fn on_beatmap_changed(&mut self, name: Option<&str>) {
            self.inner.on_beatmap_changed(name);
        }

        fn on_difficulty_changed(&mut self, difficulty: Option<&Difficulty>) {
            if difficulty.is_none() {
                self.signals.request_cancel();
            }
            self.inner.on_difficulty_changed(difficulty);
        }

        fn on_current_note_changed(&mut self, note: Option<(&HitObject, usize)>) {
            self.inner.on_current_note_changed(note);
        }

        fn on_debug_visuals_changed(&mut self, shapes: Option<&[DebugShape]>) {
            self.inner.on_debug_visuals_changed(shapes);
        }
    }

    struct FakeSource {
        result: Result<Beatmap, LocateError>,
        calls: Arc<AtomicUsize>,
    }

    impl BeatmapSource for FakeSource {
        fn locate_and_parse(&self, _beatmap_title: &str) -> Result<Beatmap, LocateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct Harness {
        pilot: Pilot,
        clock: Arc<ManualClock>,
        signals: Arc<Signals>,
        toggles: Arc<Toggles>,
        title: Arc<Mutex<String>>,
        input: Arc<Mutex<InputLog>>,
        status: RecordingStatus,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(result: Result<Beatmap, LocateError>) -> Self {
            Self::scripted(result, Script::default())
        }

        fn scripted(result: Result<Beatmap, LocateError>, script: Script) -> Self {
            let clock = Arc::new(ManualClock::new(100.0, 0.0002));
            let signals = Arc::new(Signals::new());
            let toggles = Arc::new(Toggles::new(false, false));
            let title = Arc::new(Mutex::new(TITLE.to_string()));
            let input = Arc::new(Mutex::new(InputLog { pointer: (0, 0), ..Default::default() }));
            let status = RecordingStatus::default();
            let calls = Arc::new(AtomicUsize::new(0));

            let parts = Collaborators {
                input: Box::new(FakeInput {
                    log: Arc::clone(&input),
                    clock: Arc::clone(&clock),
                    signals: Arc::clone(&signals),
                    script,
                    held_moves: 0,
                }),
                probe: Box::new(FakeProbe(Arc::clone(&title))),
                source: Box::new(FakeSource { result, calls: Arc::clone(&calls) }),
                status: if script.cancel_during_reset {
                    Box::new(CancelDuringReset { inner: status.clone(), signals: Arc::clone(&signals) })
                } else {
                    Box::new(status.clone())
                },
            };
            let shared = Shared {
                clock: clock.clone(),
                signals: Arc::clone(&signals),
                toggles: Arc::clone(&toggles),
                mods: Arc::new(ModHandler::new(ActiveMods::default())),
            };
            let settings = PilotSettings {
                reaction_time: 0.150,
                offset_ms: 0.0,
                primary_key: S,
                secondary_key: A,
                noise: NoiseParams::default(),
                spinner: SpinnerParams::default(),
            };
            let pilot = Pilot::new(settings, parts, shared, StdRng::seed_from_u64(1));
            Self { pilot, clock, signals, toggles, title, input, status, calls }
        }

        fn arm(&mut self) {
            self.pilot.step().unwrap();
            assert_eq!(self.pilot.state(), PilotState::Armed);
        }

        /// Presses sync now and returns the press time.
        fn sync_and_run(&mut self) -> f64 {
            let pressed_at = self.clock.now();
            assert!(self.signals.request_sync(pressed_at));
            self.pilot.step().unwrap();
            pressed_at
        }

        fn events(&self) -> Vec<KeyEvent> {
            self.input.lock().unwrap().events.clone()
        }

        fn downs(&self) -> Vec<Key> {
            self.events().iter().filter(|e| e.down).map(|e| e.key).collect()
        }
    }

    fn circle(x: f64, y: f64, time: f64) -> HitObject {
        HitObject { x, y, time, kind: HitObjectKind::Circle }
    }

    fn beatmap(objects: Vec<HitObject>) -> Beatmap {
        Beatmap {
            difficulty: Difficulty { approach_rate: 10.0, slider_multiplier: 1.0, ..Default::default() },
            timing_points: vec![TimingPoint { time: 0.0, beat_length: 500.0 }],
            hit_objects: objects,
            ..Default::default()
        }
    }

    fn mixed_beatmap() -> Beatmap {
        beatmap(vec![
            circle(256.0, 192.0, 1000.0),
            HitObject {
                x: 128.0,
                y: 96.0,
                time: 2000.0,
                kind: HitObjectKind::Slider(Slider {
                    curve_type: CurveType::Linear,
                    control_points: vec![Pos2::new(128.0, 96.0), Pos2::new(256.0, 96.0)],
                    slides: 2,
                    pixel_length: 100.0,
                }),
            },
            HitObject { x: 256.0, y: 192.0, time: 3200.0, kind: HitObjectKind::Spinner { end_time: 3700.0 } },
            circle(0.0, 0.0, 4200.0),
        ])
    }

    #[test]
    fn plays_circles_sliders_and_spinners_on_schedule() {
        let mut h = Harness::new(Ok(mixed_beatmap()));
        h.arm();
        let t = h.sync_and_run();
        assert_eq!(h.pilot.state(), PilotState::Idle);

        let events = h.events();
        let kinds: Vec<(bool, Key)> = events.iter().map(|e| (e.down, e.key)).collect();
        assert_eq!(
            kinds,
            vec![(true, S), (false, S), (true, A), (false, A), (true, S), (false, S), (true, A), (false, A)]
        );

        // AR10 fade-in 450ms, reaction 150ms: the first circle is due 300ms after the press.
        let first_due = t + 0.3;
        assert!(events[0].at >= first_due && events[0].at < first_due + 0.005, "first hit at {}", events[0].at);
        assert_eq!(events[0].pointer, (960, 540));

        // slider head, held for two 500ms slides
        assert!(events[2].at >= t + 1.3 && events[2].at < t + 1.305);
        assert_eq!(events[2].pointer, (672, 324));
        let hold = events[3].at - events[2].at;
        assert!((0.99..1.02).contains(&hold), "slider held for {hold}s");

        // spinner holds for its 500ms
        assert_eq!(events[4].pointer, (960, 540));
        let spin = events[5].at - events[4].at;
        assert!((0.49..0.52).contains(&spin), "spinner held for {spin}s");

        assert!(events[6].at >= t + 3.5);
        assert_eq!(events[6].pointer, (384, 108));

        let log = h.status.log();
        assert_eq!(
            log.states,
            vec![PilotState::Idle, PilotState::Armed, PilotState::Running, PilotState::Idle]
        );
        assert_eq!(log.beatmaps.first(), Some(&Some("Artist - Song [Hard]".to_string())));
        assert_eq!(log.beatmaps.last(), Some(&None));
        assert_eq!(log.notes.last(), Some(&None));
    }

    #[test]
    fn cancel_releases_held_keys_and_returns_to_idle() {
        let long_spin = beatmap(vec![HitObject {
            x: 256.0,
            y: 192.0,
            time: 1000.0,
            kind: HitObjectKind::Spinner { end_time: 60_000.0 },
        }]);
        let mut h = Harness::scripted(Ok(long_spin), Script { cancel_on_held_move: Some(50), ..Default::default() });
        h.arm();
        let t = h.sync_and_run();

        assert_eq!(h.pilot.state(), PilotState::Idle);
        assert!(h.clock.peek() < t + 5.0, "cancel must interrupt the spin");
        let events = h.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].down && !events[1].down);
        assert_eq!(events[0].key, events[1].key);
        assert!(!h.signals.should_stop(), "cancel flag is cleared on reset");
        assert_eq!(h.status.log().beatmaps.last(), Some(&None));
    }

    fn long_slider(slides: u32) -> Beatmap {
        beatmap(vec![HitObject {
            x: 128.0,
            y: 96.0,
            time: 1000.0,
            kind: HitObjectKind::Slider(Slider {
                curve_type: CurveType::Linear,
                control_points: vec![Pos2::new(128.0, 96.0), Pos2::new(256.0, 96.0)],
                slides,
                pixel_length: 100.0,
            }),
        }])
    }

    #[test]
    fn cancel_during_slider_releases_the_key() {
        let mut h = Harness::scripted(Ok(long_slider(40)), Script { cancel_on_held_move: Some(10), ..Default::default() });
        h.arm();
        h.sync_and_run();
        let events = h.events();
        assert_eq!(events.iter().filter(|e| e.down).count(), 1);
        assert_eq!(events.last().map(|e| e.down), Some(false));
        assert_eq!(h.pilot.state(), PilotState::Idle);
    }

    #[test]
    fn key_alternation_continues_through_streams() {
        let objects = vec![
            circle(0.0, 0.0, 1000.0),
            circle(300.0, 300.0, 1500.0),
            circle(310.0, 300.0, 1600.0),
            circle(320.0, 300.0, 1700.0),
            circle(500.0, 350.0, 2500.0),
        ];
        let mut h = Harness::new(Ok(beatmap(objects)));
        h.arm();
        let t = h.sync_and_run();

        assert_eq!(h.downs(), vec![S, A, S, A, S]);
        let downs: Vec<f64> = h.events().iter().filter(|e| e.down).map(|e| e.at).collect();
        // press time + 0.3 is song time 1000ms
        for (at, ms) in downs.iter().zip([1000.0, 1500.0, 1600.0, 1700.0, 2500.0]) {
            let due = t + 0.3 + (ms - 1000.0) / 1000.0;
            assert!(*at >= due - 1e-9 && *at < due + 0.012, "hit at {at} due {due}");
        }
        let notes = h.status.log().notes.clone();
        for i in 0..5 {
            assert!(notes.contains(&Some(i)), "note {i} was never reported");
        }
    }

    #[test]
    fn slider_without_path_still_advances_alternation() {
        let objects = vec![
            circle(100.0, 100.0, 1000.0),
            HitObject {
                x: 300.0,
                y: 100.0,
                time: 1500.0,
                kind: HitObjectKind::Slider(Slider {
                    curve_type: CurveType::Linear,
                    control_points: vec![Pos2::new(300.0, 100.0)],
                    slides: 1,
                    pixel_length: 50.0,
                }),
            },
            circle(500.0, 100.0, 2000.0),
        ];
        let mut h = Harness::new(Ok(beatmap(objects)));
        h.arm();
        h.sync_and_run();
        assert_eq!(h.downs(), vec![S, S]);
    }

    #[test]
    fn input_fault_releases_keys_and_propagates() {
        let script = Script { fail_on_held_move: Some(20), ..Default::default() };
        let mut h = Harness::scripted(Ok(long_slider(40)), script);
        h.arm();
        assert!(h.signals.request_sync(h.clock.now()));

        assert_eq!(h.pilot.run(), Err("pointer device lost".to_string()));
        assert_eq!(h.pilot.state(), PilotState::Idle);
        assert_eq!(h.signals.state(), PilotState::Idle);
        let events = h.events();
        assert_eq!(events.iter().filter(|e| e.down).count(), 1);
        assert_eq!(events.last().map(|e| (e.down, e.key)), Some((false, S)), "held key released before the error");
        assert_eq!(h.status.log().beatmaps.last(), Some(&None));
    }

    #[test]
    fn cancel_interrupts_the_approach_movement() {
        let far = beatmap(vec![circle(0.0, 0.0, 1000.0), circle(512.0, 384.0, 9000.0)]);
        let mut h = Harness::scripted(Ok(far), Script { cancel_on_move: Some(10), ..Default::default() });
        h.arm();
        let t = h.sync_and_run();

        assert!(h.events().is_empty(), "cancelled before the first hit");
        assert!(h.clock.peek() < t + 0.3);
        assert_eq!(h.input.lock().unwrap().moves, 10);
        assert_eq!(h.pilot.state(), PilotState::Idle);
    }

    #[test]
    fn cancel_interrupts_a_stream_sweep() {
        let stream: Vec<HitObject> =
            (0..6).map(|i| circle(100.0 + 20.0 * i as f64, 100.0, 1000.0 + 100.0 * i as f64)).collect();
        let mut h = Harness::scripted(Ok(beatmap(stream)), Script { cancel_on_move: Some(400), ..Default::default() });
        h.arm();
        let t = h.sync_and_run();

        let events = h.events();
        let downs = events.iter().filter(|e| e.down).count();
        assert!((1..6).contains(&downs), "{downs} of 6 stream notes hit");
        assert_eq!(events.iter().filter(|e| !e.down).count(), downs, "every press was released");
        assert!(h.clock.peek() < t + 0.8, "stopped before the last note was due");
        assert_eq!(h.pilot.state(), PilotState::Idle);
    }

    #[test]
    fn cancel_pressed_during_reset_does_not_leak_into_the_next_run() {
        let script = Script { cancel_during_reset: true, ..Default::default() };
        let mut h = Harness::scripted(Ok(beatmap(vec![circle(256.0, 192.0, 1000.0)])), script);
        h.arm();
        h.sync_and_run();
        assert_eq!(h.pilot.state(), PilotState::Idle);
        assert!(!h.signals.should_stop(), "stale cancel survived the reset");

        h.arm();
        h.sync_and_run();
        assert_eq!(h.downs(), vec![S, S], "second run played its note");
    }

    #[test]
    fn losing_the_beatmap_window_disarms() {
        let mut h = Harness::new(Ok(mixed_beatmap()));
        h.arm();
        *h.title.lock().unwrap() = "osu!".to_string();
        h.pilot.step().unwrap();
        assert_eq!(h.pilot.state(), PilotState::Idle);
        assert!(!h.signals.request_sync(h.clock.now()), "sync is ignored once idle");
        assert!(h.events().is_empty());

        *h.title.lock().unwrap() = TITLE.to_string();
        h.pilot.step().unwrap();
        assert_eq!(h.pilot.state(), PilotState::Armed, "the same map re-arms after a reset");
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_directory_backs_off() {
        let mut h = Harness::new(Err(LocateError::DirectoryNotFound(PathBuf::from("osu!"))));
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        let message = h.status.log().beatmaps.last().cloned().flatten().unwrap_or_default();
        assert!(message.starts_with("CRITICAL"), "status was '{message}'");

        h.clock.sleep(1.0);
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 1, "no probing during the backoff");

        h.clock.sleep(4.5);
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.pilot.state(), PilotState::Idle);
    }

    #[test]
    fn unresolved_beatmap_is_retried_on_title_change_only() {
        let mut h = Harness::new(Err(LocateError::FolderNotFound("artistsong".into())));
        h.pilot.step().unwrap();
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        *h.title.lock().unwrap() = "osu!  - Artist - Other [Hard]".to_string();
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.status.log().beatmaps.last(), Some(&Some("Beatmap file not found.".to_string())));
    }

    #[test]
    fn non_beatmap_titles_are_ignored() {
        let mut h = Harness::new(Ok(mixed_beatmap()));
        *h.title.lock().unwrap() = "Discord".to_string();
        h.pilot.step().unwrap();
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.pilot.state(), PilotState::Idle);
    }

    #[test]
    fn debug_visuals_describe_the_next_objects() {
        let mut h = Harness::new(Ok(mixed_beatmap()));
        h.toggles.toggle_debug_visuals();
        h.arm();
        h.sync_and_run();

        let log = h.status.log();
        let first = log.visuals.iter().flatten().next().expect("visuals were published").clone();
        assert_eq!(first.len(), 3);
        match &first[0] {
            DebugShape::Slider { path } => {
                assert_eq!(path.first(), Some(&(672, 324)));
                assert_eq!(path.len(), 101);
            }
            other => panic!("expected the slider first, got {other:?}"),
        }
        assert_eq!(first[1], DebugShape::Circle { center: (960, 540), radius: 30 });
        assert_eq!(first[2], DebugShape::Circle { center: (384, 108), radius: 25 });
        assert_eq!(log.visuals.last(), Some(&None), "visuals are cleared after the run");
    }

    #[test]
    fn shutdown_ends_the_poll_loop() {
        let mut h = Harness::new(Ok(mixed_beatmap()));
        h.signals.request_shutdown();
        assert_eq!(h.pilot.run(), Ok(()));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }
}
