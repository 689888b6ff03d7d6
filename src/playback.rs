//! The playback controller: a cooperative state machine that reveals a
//! sequence term by term, waits for narration and timers, scores answers and
//! optionally loops hands-free.
//!
//! Nothing here reads the wall clock or blocks. Every operation that can arm
//! a timer takes the current `Instant`; the event loop calls
//! [`Controller::on_tick`] to fire due timers and
//! [`Controller::on_speech_finished`] when a speaker reports completion.
//! Each deferred continuation is tagged with the [`RunToken`] of the run that
//! armed it and is dropped if that run is no longer current.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::config::Settings;
use crate::history::HistoryLog;
use crate::narration::{Narration, Narrator, UtteranceId};
use crate::scheduler::{Scheduler, TimerId};
use crate::sequence::{self, Sequence};

/// Continuous mode: how long the answer placeholder stays up.
pub const AUTO_RESULT_DELAY: Duration = Duration::from_secs(2);
/// Continuous mode without narration: how long the result stays up.
pub const RESULT_HOLD: Duration = Duration::from_secs(2);
/// Upper bound on waiting for a speech completion signal.
pub const NARRATION_FALLBACK: Duration = Duration::from_secs(10);

const MAX_ANSWER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Stage {
    Idle,
    Flashing,
    AwaitingAnswer,
    ShowingResult,
}

/// Monotonic id of the active run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunToken(u64);

impl RunToken {
    fn next(self) -> Self {
        RunToken(self.0 + 1)
    }
}

/// Result of a finished run. `submitted` is `None` in continuous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub submitted: Option<i64>,
    pub target_sum: i64,
}

impl Outcome {
    pub fn is_correct(&self) -> Option<bool> {
        self.submitted.map(|answer| answer == self.target_sum)
    }
}

/// Notifications for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StageChanged {
        run: RunToken,
        stage: Stage,
        index: Option<usize>,
    },
    Revealed {
        run: RunToken,
        index: usize,
        value: i64,
    },
    Hidden {
        run: RunToken,
        index: usize,
    },
    Scored(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Narration of a term is over; keep it visible for the flash duration.
    Hold(usize),
    Hide(usize),
    Advance(usize),
    ShowResult,
    NextRun,
    NarrationFallback(UtteranceId),
}

#[derive(Debug, Clone, Copy)]
struct Wake {
    run: RunToken,
    step: Step,
}

#[derive(Debug, Clone, Copy)]
struct NarrationWait {
    run: RunToken,
    id: UtteranceId,
    then: Step,
    fallback: TimerId,
}

pub struct Controller<R = StdRng> {
    /// Applied at the start of the next run.
    settings: Settings,
    /// Snapshot the current run was started with.
    active: Settings,
    stage: Stage,
    sequence: Option<Sequence>,
    index: usize,
    visible: bool,
    answer: String,
    last_outcome: Option<Outcome>,
    replay_eligible: bool,
    run: RunToken,
    scheduler: Scheduler<Wake>,
    narration_wait: Option<NarrationWait>,
    narrator: Narrator,
    history: HistoryLog,
    subscribers: Vec<Sender<PlaybackEvent>>,
    rng: R,
}

impl Controller<StdRng> {
    pub fn new(settings: Settings, narrator: Narrator) -> Self {
        Self::with_rng(settings, narrator, StdRng::from_entropy())
    }
}

impl<R: Rng> Controller<R> {
    pub fn with_rng(settings: Settings, narrator: Narrator, rng: R) -> Self {
        Self {
            active: settings.clone(),
            settings,
            stage: Stage::Idle,
            sequence: None,
            index: 0,
            visible: false,
            answer: String::new(),
            last_outcome: None,
            replay_eligible: false,
            run: RunToken::default(),
            scheduler: Scheduler::new(),
            narration_wait: None,
            narrator,
            history: HistoryLog::new(),
            subscribers: Vec::new(),
            rng,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot the current (or last) run was started with.
    pub fn active(&self) -> &Settings {
        &self.active
    }

    /// Stage new settings. A run in progress keeps the snapshot it started with.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&self) -> RunToken {
        self.run
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Term currently on screen, if any.
    pub fn current_value(&self) -> Option<i64> {
        match (self.stage, self.visible) {
            (Stage::Flashing, true) => self.sequence.as_ref()?.get(self.index),
            _ => None,
        }
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    pub fn replay_eligible(&self) -> bool {
        self.replay_eligible
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    pub fn is_continuous(&self) -> bool {
        self.active.continuous_mode()
    }

    /// Whether the start/stop toggle should stop.
    pub fn is_running(&self) -> bool {
        match self.stage {
            Stage::Idle => false,
            Stage::Flashing | Stage::AwaitingAnswer => true,
            Stage::ShowingResult => self.active.continuous_mode(),
        }
    }

    /// Earliest pending timer, for event loops that sleep until it.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Generate a fresh sequence from the staged settings and start flashing.
    pub fn start(&mut self, now: Instant) {
        let settings = self.settings.clone();
        let sequence = sequence::generate(&settings, &mut self.rng);
        self.begin_run(sequence, now);
    }

    /// Start a run over caller supplied terms. Empty sequences are refused.
    pub fn start_with(&mut self, sequence: Sequence, now: Instant) -> bool {
        if sequence.is_empty() {
            return false;
        }
        self.begin_run(sequence, now);
        true
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_running() {
            self.stop();
        } else {
            self.start(now);
        }
    }

    /// Flash the current sequence again without regenerating it.
    pub fn replay(&mut self, now: Instant) -> bool {
        if !self.replay_eligible || self.active.continuous_mode() || self.sequence.is_none() {
            debug!(stage = %self.stage, eligible = self.replay_eligible, "replay rejected");
            return false;
        }
        self.cancel_pending();
        self.run = self.run.next();
        self.answer.clear();
        self.last_outcome = None;
        self.set_stage(Stage::Flashing);
        self.reveal(0, now);
        true
    }

    /// Abandon the current run. Returns false when already idle.
    pub fn stop(&mut self) -> bool {
        if self.stage == Stage::Idle {
            return false;
        }
        self.cancel_pending();
        self.run = self.run.next();
        self.sequence = None;
        self.index = 0;
        self.visible = false;
        self.answer.clear();
        self.last_outcome = None;
        self.replay_eligible = false;
        self.set_stage(Stage::Idle);
        true
    }

    /// Teardown: nothing scheduled may outlive the engine.
    pub fn shutdown(&mut self) {
        self.stop();
        self.cancel_pending();
        self.subscribers.clear();
    }

    /// Append a character to the pending answer. Only digits and a leading
    /// minus sign are accepted, and only while an answer is expected.
    pub fn type_answer(&mut self, c: char) -> bool {
        if !self.accepts_answer() || self.answer.len() >= MAX_ANSWER_LEN {
            return false;
        }
        let ok = c.is_ascii_digit() || (c == '-' && self.answer.is_empty());
        if ok {
            self.answer.push(c);
        }
        ok
    }

    pub fn erase_answer(&mut self) -> bool {
        self.accepts_answer() && self.answer.pop().is_some()
    }

    pub fn clear_answer(&mut self) {
        if self.accepts_answer() {
            self.answer.clear();
        }
    }

    pub fn accepts_answer(&self) -> bool {
        self.stage == Stage::AwaitingAnswer && !self.active.continuous_mode()
    }

    /// Score the pending answer.
    pub fn submit(&mut self) -> Option<Outcome> {
        let answer = self.answer.clone();
        self.submit_answer(&answer)
    }

    /// Score `answer` against the target sum. Ignored unless an answer is
    /// expected and `answer` parses as an integer.
    pub fn submit_answer(&mut self, answer: &str) -> Option<Outcome> {
        if !self.accepts_answer() {
            return None;
        }
        let submitted = answer.trim().parse::<i64>().ok()?;
        let sequence = self.sequence.as_ref()?;

        let outcome = Outcome {
            submitted: Some(submitted),
            target_sum: sequence.target_sum(),
        };
        self.history.record(sequence);
        self.answer = answer.trim().to_string();
        self.last_outcome = Some(outcome);
        self.emit(PlaybackEvent::Scored(outcome));
        self.set_stage(Stage::ShowingResult);
        Some(outcome)
    }

    /// Fire every timer due at `now`.
    pub fn on_tick(&mut self, now: Instant) {
        while let Some((deadline, wake)) = self.scheduler.pop_due(now) {
            if wake.run != self.run {
                trace!(?wake, current = ?self.run, "discarding stale timer");
                continue;
            }
            self.resume(wake.step, deadline);
        }
    }

    /// A speaker reported that utterance `id` has finished.
    pub fn on_speech_finished(&mut self, id: UtteranceId, now: Instant) {
        self.narrator.finish(id);
        match self.narration_wait {
            Some(wait) if wait.id == id && wait.run == self.run => {
                self.narration_wait = None;
                self.scheduler.cancel(wait.fallback);
                self.resume(wait.then, now);
            }
            _ => trace!(?id, "discarding stale narration completion"),
        }
    }

    fn begin_run(&mut self, sequence: Sequence, now: Instant) {
        self.cancel_pending();
        if self.stage == Stage::ShowingResult && !self.active.continuous_mode() {
            self.set_stage(Stage::Idle);
        }
        self.run = self.run.next();
        self.active = self.settings.clone();
        debug!(run = ?self.run, terms = sequence.len(), "starting run");
        self.sequence = Some(sequence);
        self.replay_eligible = false;
        self.answer.clear();
        self.last_outcome = None;
        self.set_stage(Stage::Flashing);
        self.reveal(0, now);
    }

    fn cancel_pending(&mut self) {
        self.scheduler.clear();
        self.narration_wait = None;
        self.narrator.cancel();
    }

    fn arm(&mut self, now: Instant, delay: Duration, step: Step) -> TimerId {
        let run = self.run;
        self.scheduler.after(now, delay, Wake { run, step })
    }

    /// Narrate `value`, then continue with `then` once speech is over or the
    /// fallback expires, whichever comes first. `skipped_delay` stands in for
    /// speech when there is none.
    fn narrate_then(
        &mut self,
        value: i64,
        is_result: bool,
        then: Step,
        skipped_delay: Option<Duration>,
        now: Instant,
    ) {
        let narration = self.narrator.narrate(
            value,
            is_result,
            self.active.narration_enabled(),
            self.active.language_tag(),
        );
        match narration {
            Narration::Pending(id) => {
                let fallback = self.arm(now, NARRATION_FALLBACK, Step::NarrationFallback(id));
                self.narration_wait = Some(NarrationWait {
                    run: self.run,
                    id,
                    then,
                    fallback,
                });
            }
            Narration::Skipped => match skipped_delay {
                Some(delay) => {
                    self.arm(now, delay, then);
                }
                None => self.resume(then, now),
            },
        }
    }

    fn reveal(&mut self, index: usize, now: Instant) {
        let Some(value) = self.sequence.as_ref().and_then(|s| s.get(index)) else {
            self.enter_awaiting(now);
            return;
        };
        self.index = index;
        self.visible = true;
        self.emit(PlaybackEvent::Revealed {
            run: self.run,
            index,
            value,
        });
        self.narrate_then(value, false, Step::Hold(index), None, now);
    }

    fn enter_awaiting(&mut self, now: Instant) {
        self.visible = false;
        self.replay_eligible = true;
        self.set_stage(Stage::AwaitingAnswer);
        if self.active.continuous_mode() {
            self.arm(now, AUTO_RESULT_DELAY, Step::ShowResult);
        }
    }

    fn show_continuous_result(&mut self, now: Instant) {
        let Some(target_sum) = self.sequence.as_ref().map(Sequence::target_sum) else {
            return;
        };
        let outcome = Outcome {
            submitted: None,
            target_sum,
        };
        self.last_outcome = Some(outcome);
        self.emit(PlaybackEvent::Scored(outcome));
        self.set_stage(Stage::ShowingResult);
        self.narrate_then(target_sum, true, Step::NextRun, Some(RESULT_HOLD), now);
    }

    fn resume(&mut self, step: Step, now: Instant) {
        match step {
            Step::Hold(index) => {
                let flash = self.active.flash_duration();
                self.arm(now, flash, Step::Hide(index));
            }
            Step::Hide(index) => {
                self.visible = false;
                self.emit(PlaybackEvent::Hidden {
                    run: self.run,
                    index,
                });
                let interval = self.active.interval_duration();
                self.arm(now, interval, Step::Advance(index));
            }
            Step::Advance(index) => {
                let len = self.sequence.as_ref().map_or(0, Sequence::len);
                if index + 1 < len {
                    self.reveal(index + 1, now);
                } else {
                    self.enter_awaiting(now);
                }
            }
            Step::ShowResult => self.show_continuous_result(now),
            Step::NextRun => self.start(now),
            Step::NarrationFallback(id) => match self.narration_wait {
                Some(wait) if wait.id == id => {
                    warn!(?id, "no speech completion signal, moving on");
                    self.narration_wait = None;
                    self.narrator.cancel();
                    self.resume(wait.then, now);
                }
                _ => trace!(?id, "fallback for settled narration"),
            },
        }
    }

    fn set_stage(&mut self, stage: Stage) {
        if self.stage != stage {
            debug!(run = ?self.run, from = %self.stage, to = %stage, "stage change");
        }
        self.stage = stage;
        let index = (stage == Stage::Flashing).then_some(self.index);
        self.emit(PlaybackEvent::StageChanged {
            run: self.run,
            stage,
            index,
        });
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<R> Drop for Controller<R> {
    fn drop(&mut self) {
        self.scheduler.clear();
        self.narrator.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::narration::RecordingSpeaker;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn settings(continuous: bool, narrate: bool) -> Settings {
        Config {
            digit_count: 1,
            item_count: 3,
            flash_duration_ms: 100,
            interval_duration_ms: 50,
            continuous_mode: continuous,
            narration_enabled: narrate,
            ..Config::default()
        }
        .validate()
    }

    fn controller(s: Settings) -> Controller<StdRng> {
        Controller::with_rng(s, Narrator::silent(), StdRng::seed_from_u64(1))
    }

    #[test]
    fn starts_idle() {
        let c = controller(settings(false, false));
        assert_eq!(c.stage(), Stage::Idle);
        assert!(c.sequence().is_none());
        assert!(!c.is_running());
        assert_eq!(c.current_value(), None);
    }

    #[test]
    fn reveal_hold_hide_advance_timing() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        assert!(c.start_with(Sequence::from_terms(vec![4, 7, 2]), t0));

        assert_eq!(c.stage(), Stage::Flashing);
        assert_eq!(c.current_value(), Some(4));

        c.on_tick(t0 + ms(99));
        assert_eq!(c.current_value(), Some(4));
        c.on_tick(t0 + ms(100));
        assert_eq!(c.current_value(), None, "hidden after flash duration");
        assert_eq!(c.index(), 0);
        c.on_tick(t0 + ms(150));
        assert_eq!(c.current_value(), Some(7));
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn large_tick_runs_through_to_awaiting_answer() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![4, 7, 2]), t0);
        c.on_tick(t0 + ms(449));
        assert_eq!(c.stage(), Stage::Flashing);
        c.on_tick(t0 + ms(450));
        assert_eq!(c.stage(), Stage::AwaitingAnswer);
        assert!(c.replay_eligible());
        assert!(c.accepts_answer());
    }

    #[test]
    fn submit_scores_and_records_history() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![4, 7, 2]), t0);
        c.on_tick(t0 + ms(1000));

        for ch in "13".chars() {
            assert!(c.type_answer(ch));
        }
        let outcome = c.submit().unwrap();
        assert_eq!(outcome.is_correct(), Some(true));
        assert_eq!(outcome.target_sum, 13);
        assert_eq!(c.stage(), Stage::ShowingResult);
        assert_eq!(c.history().latest(), Some("4 + 7 + 2"));
        assert!(!c.is_running());
    }

    #[test]
    fn invalid_answer_is_ignored() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![4, 7, 2]), t0);
        c.on_tick(t0 + ms(1000));
        assert_eq!(c.submit_answer("  "), None);
        assert_eq!(c.submit_answer("abc"), None);
        assert_eq!(c.stage(), Stage::AwaitingAnswer);
        assert!(c.history().is_empty());
    }

    #[test]
    fn answer_editing_rules() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        assert!(!c.type_answer('1'), "no answer expected while idle");
        c.start_with(Sequence::from_terms(vec![1, 2]), t0);
        assert!(!c.type_answer('1'), "no answer expected while flashing");
        c.on_tick(t0 + ms(1000));
        assert!(c.type_answer('-'));
        assert!(!c.type_answer('-'));
        assert!(!c.type_answer('x'));
        assert!(c.type_answer('4'));
        assert_eq!(c.answer(), "-4");
        assert!(c.erase_answer());
        assert_eq!(c.answer(), "-");
        c.clear_answer();
        assert_eq!(c.answer(), "");
        assert!(!c.erase_answer());
    }

    #[test]
    fn replay_requires_completed_pass() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![3, 5]), t0);
        let run = c.run();
        assert!(!c.replay(t0 + ms(10)));
        assert_eq!(c.run(), run);
        assert_eq!(c.index(), 0);

        c.on_tick(t0 + ms(1000));
        assert!(c.replay(t0 + ms(1000)));
        assert_eq!(c.stage(), Stage::Flashing);
        assert_eq!(c.current_value(), Some(3));
        assert_eq!(c.sequence().unwrap().terms(), &[3, 5]);
        assert_ne!(c.run(), run);
    }

    #[test]
    fn replay_after_result_keeps_sequence() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![3, 5]), t0);
        c.on_tick(t0 + ms(1000));
        c.submit_answer("8").unwrap();
        assert!(c.replay(t0 + ms(1000)));
        assert_eq!(c.last_outcome(), None);
        assert_eq!(c.answer(), "");
        assert_eq!(c.sequence().unwrap().target_sum(), 8);
    }

    #[test]
    fn stop_cancels_everything() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start(t0);
        assert!(c.stop());
        assert!(!c.stop());
        assert_eq!(c.stage(), Stage::Idle);
        assert!(c.sequence().is_none());
        assert_eq!(c.next_deadline(), None);
        c.on_tick(t0 + Duration::from_secs(60));
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[test]
    fn toggle_starts_and_stops() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.toggle(t0);
        assert_eq!(c.stage(), Stage::Flashing);
        c.toggle(t0);
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[test]
    fn start_from_result_passes_through_idle() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![1, 1]), t0);
        c.on_tick(t0 + ms(1000));
        c.submit_answer("2");
        let events = c.subscribe();
        c.start(t0 + ms(1000));
        let stages: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                PlaybackEvent::StageChanged { stage, .. } => Some(stage),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![Stage::Idle, Stage::Flashing]);
    }

    #[test]
    fn settings_change_mid_run_applies_next_run() {
        let t0 = Instant::now();
        let mut c = controller(settings(false, false));
        c.start_with(Sequence::from_terms(vec![1, 1]), t0);
        c.set_settings(
            Config {
                flash_duration_ms: 2000,
                ..Config::default()
            }
            .validate(),
        );
        c.on_tick(t0 + ms(100));
        assert_eq!(c.current_value(), None, "old flash duration still applies");
        assert_eq!(c.settings().flash_duration(), ms(2000));
    }

    #[test]
    fn narration_gates_the_flash_hold() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(false, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![4, -2, 9]), t0);
        assert_eq!(recorder.texts(), vec!["four".to_string()]);

        // no hold timer until speech completes
        c.on_tick(t0 + ms(500));
        assert_eq!(c.current_value(), Some(4));

        let id = recorder.last_id().unwrap();
        c.on_speech_finished(id, t0 + ms(500));
        c.on_tick(t0 + ms(599));
        assert_eq!(c.current_value(), Some(4));
        c.on_tick(t0 + ms(600));
        assert_eq!(c.current_value(), None);
        c.on_tick(t0 + ms(650));
        assert_eq!(c.current_value(), Some(-2));
        assert_eq!(recorder.texts().last().unwrap(), "minus two");
    }

    #[test]
    fn fallback_rescues_stalled_narration() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(false, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![4, 5]), t0);
        let stalled = recorder.last_id().unwrap();
        c.on_tick(t0 + NARRATION_FALLBACK);
        // fallback resolved the wait and armed the hold
        c.on_tick(t0 + NARRATION_FALLBACK + ms(100));
        assert_eq!(c.current_value(), None);
        assert!(recorder.cancel_count() >= 1);

        // a late completion for the stalled utterance changes nothing
        let index = c.index();
        c.on_speech_finished(stalled, t0 + NARRATION_FALLBACK + ms(120));
        assert_eq!(c.index(), index);
        assert_eq!(c.current_value(), None);
    }

    #[test]
    fn completion_cancels_fallback() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(false, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![4, 5]), t0);
        c.on_speech_finished(recorder.last_id().unwrap(), t0 + ms(10));
        // only the hold timer remains
        assert_eq!(c.next_deadline(), Some(t0 + ms(110)));
    }

    #[test]
    fn failing_speaker_does_not_block_progress() {
        let t0 = Instant::now();
        let mut c = Controller::with_rng(
            settings(false, true),
            Narrator::new(Some(Box::new(RecordingSpeaker::failing()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![1, 2, 3]), t0);
        c.on_tick(t0 + ms(450));
        assert_eq!(c.stage(), Stage::AwaitingAnswer);
    }

    #[test]
    fn continuous_mode_loops_without_history() {
        let t0 = Instant::now();
        let mut c = controller(settings(true, false));
        c.start_with(Sequence::from_terms(vec![2, 2, 2]), t0);
        let first = c.run();

        c.on_tick(t0 + ms(450));
        assert_eq!(c.stage(), Stage::AwaitingAnswer);
        assert!(!c.accepts_answer());
        assert!(!c.replay(t0 + ms(450)), "no replay in continuous mode");

        c.on_tick(t0 + ms(450) + AUTO_RESULT_DELAY);
        assert_eq!(c.stage(), Stage::ShowingResult);
        assert_eq!(
            c.last_outcome(),
            Some(Outcome {
                submitted: None,
                target_sum: 6
            })
        );
        assert!(c.is_running());

        c.on_tick(t0 + ms(450) + AUTO_RESULT_DELAY + RESULT_HOLD);
        assert_eq!(c.stage(), Stage::Flashing);
        assert_ne!(c.run(), first);
        assert_eq!(c.sequence().unwrap().len(), 3);
        assert!(c.history().is_empty());
    }

    #[test]
    fn continuous_result_is_narrated() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(true, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![5, 6]), t0);
        let mut now = t0;
        for _ in 0..2 {
            c.on_speech_finished(recorder.last_id().unwrap(), now);
            now += ms(150);
            c.on_tick(now);
        }
        assert_eq!(c.stage(), Stage::AwaitingAnswer);
        now += AUTO_RESULT_DELAY;
        c.on_tick(now);
        assert_eq!(c.stage(), Stage::ShowingResult);
        assert_eq!(recorder.texts().last().unwrap(), "equals eleven");

        c.on_speech_finished(recorder.last_id().unwrap(), now + ms(700));
        assert_eq!(c.stage(), Stage::Flashing);
    }

    #[test]
    fn continuous_loop_survives_silent_result_narration() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(true, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        c.start_with(Sequence::from_terms(vec![5, 6]), t0);
        let first = c.run();
        let mut now = t0;
        for _ in 0..2 {
            c.on_speech_finished(recorder.last_id().unwrap(), now);
            now += ms(150);
            c.on_tick(now);
        }
        now += AUTO_RESULT_DELAY;
        c.on_tick(now);
        assert_eq!(c.stage(), Stage::ShowingResult);
        assert_eq!(recorder.texts().last().unwrap(), "equals eleven");

        // the speaker never reports completion of the result
        c.on_tick(now + NARRATION_FALLBACK - ms(1));
        assert_eq!(c.stage(), Stage::ShowingResult);
        assert_eq!(c.run(), first);

        c.on_tick(now + NARRATION_FALLBACK);
        assert_eq!(c.stage(), Stage::Flashing);
        assert_ne!(c.run(), first);
        assert!(c.history().is_empty());
        assert_eq!(recorder.texts().len(), 4, "next run narrates its first term");
    }

    #[test]
    fn shutdown_silences_and_drops_subscribers() {
        let t0 = Instant::now();
        let recorder = RecordingSpeaker::new();
        let mut c = Controller::with_rng(
            settings(false, true),
            Narrator::new(Some(Box::new(recorder.clone()))),
            StdRng::seed_from_u64(1),
        );
        let events = c.subscribe();
        c.start(t0);
        c.shutdown();
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(recorder.cancel_count(), 1);
        assert!(c.next_deadline().is_none());
        drop(c);
        assert!(events.try_iter().count() > 0);
    }
}
