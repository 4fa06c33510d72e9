//! Reference-counted pause state and the adjusted game clock.
//!
//! Any subsystem may hold the game paused under its own reason; play resumes
//! only once every reason has been released. Time spent paused is excluded
//! from [`PauseClock::adjusted_time`], which is the only elapsed-time basis
//! gameplay logic should use.

use crate::audio::AudioDevice;
use crate::time::Clock;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Well-known pause reasons. Reasons are opaque strings, so subsystems are
/// free to use their own.
pub mod reason {
    pub const MENU: &str = "menu";
    pub const COUNTDOWN: &str = "countdown";
    pub const AUDIO: &str = "audio";
    pub const VICTORY: &str = "victory";
    pub const DEFEAT: &str = "defeat";
    pub const HIDDEN: &str = "hidden";
}

/// Edge of the reason set's size crossing zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// empty -> non-empty
    Paused,
    /// non-empty -> empty
    Resumed,
}

#[derive(Debug, Default, Clone)]
pub struct ReasonSet {
    reasons: BTreeSet<String>,
}

impl ReasonSet {
    pub fn insert(&mut self, reason: &str) -> Option<Transition> {
        let was_empty = self.reasons.is_empty();
        if self.reasons.insert(reason.to_string()) && was_empty {
            Some(Transition::Paused)
        } else {
            None
        }
    }

    pub fn remove(&mut self, reason: &str) -> Option<Transition> {
        if self.reasons.remove(reason) && self.reasons.is_empty() {
            Some(Transition::Resumed)
        } else {
            None
        }
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.reasons.contains(reason)
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.reasons.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.reasons.clear();
    }
}

pub struct PauseClock {
    clock: Rc<dyn Clock>,
    audio: Rc<dyn AudioDevice>,
    reasons: ReasonSet,
    start_time: Option<f64>,
    pause_start_time: f64,
    total_paused_time: f64,
    audio_suspended_by_clock: bool,
}

impl PauseClock {
    pub fn new(clock: Rc<dyn Clock>, audio: Rc<dyn AudioDevice>) -> Self {
        PauseClock {
            clock,
            audio,
            reasons: ReasonSet::default(),
            start_time: None,
            pause_start_time: 0.0,
            total_paused_time: 0.0,
            audio_suspended_by_clock: false,
        }
    }

    /// Begins timing from now, running, with no reasons held.
    pub fn start(&mut self) {
        self.reinitialize(Some(self.clock.now()));
        log::debug!("pause clock started");
    }

    /// Session restart: timing restarts from now and nothing paused before
    /// the reset is carried over.
    pub fn reset(&mut self) {
        self.reinitialize(Some(self.clock.now()));
        log::debug!("pause clock reset");
    }

    /// Teardown. `adjusted_time()` reads 0 until the next `start()`.
    pub fn cleanup(&mut self) {
        self.reinitialize(None);
    }

    fn reinitialize(&mut self, start_time: Option<f64>) {
        self.release_audio();
        self.reasons.clear();
        self.start_time = start_time;
        self.pause_start_time = 0.0;
        self.total_paused_time = 0.0;
    }

    pub fn pause(&mut self, reason: &str, suspend_audio: bool) {
        if let Some(transition) = self.reasons.insert(reason) {
            self.apply(transition, suspend_audio);
        }
        log::debug!("pause '{}' -> {:?}", reason, self.pause_reasons());
    }

    pub fn resume(&mut self, reason: &str) {
        if let Some(transition) = self.reasons.remove(reason) {
            self.apply(transition, false);
        }
        log::debug!("resume '{}' -> {:?}", reason, self.pause_reasons());
    }

    fn apply(&mut self, transition: Transition, suspend_audio: bool) {
        let now = self.clock.now();
        match transition {
            Transition::Paused => {
                self.pause_start_time = now;
                if suspend_audio {
                    self.audio.suspend_background_track();
                    self.audio_suspended_by_clock = true;
                }
            }
            Transition::Resumed => {
                self.total_paused_time += (now - self.pause_start_time).max(0.0);
                self.release_audio();
            }
        }
    }

    fn release_audio(&mut self) {
        if self.audio_suspended_by_clock {
            self.audio.resume_background_track();
            self.audio_suspended_by_clock = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn pause_reasons(&self) -> Vec<String> {
        self.reasons.iter().map(str::to_string).collect()
    }

    pub fn has_pause_reason(&self, reason: &str) -> bool {
        self.reasons.contains(reason)
    }

    pub fn audio_suspended_by_clock(&self) -> bool {
        self.audio_suspended_by_clock
    }

    /// Completed pauses only.
    pub fn total_paused_time(&self) -> f64 {
        self.total_paused_time
    }

    pub fn current_pause_duration(&self) -> f64 {
        if self.is_paused() {
            (self.clock.now() - self.pause_start_time).max(0.0)
        } else {
            0.0
        }
    }

    /// Milliseconds of unpaused play since `start()`. Frozen while paused.
    pub fn adjusted_time(&self) -> f64 {
        match self.start_time {
            Some(start) => {
                let elapsed = self.clock.now() - start;
                (elapsed - self.total_paused_time - self.current_pause_duration()).max(0.0)
            }
            None => 0.0,
        }
    }
}
