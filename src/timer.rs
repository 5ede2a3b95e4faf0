//! Writing timer engine behind the tools panel: a stopwatch plus two
//! countdown modes. All arithmetic is anchored on the `Instant` captured at
//! start so a paused timer never drifts.

use std::time::{Duration, Instant};

pub const POMODORO: Duration = Duration::from_secs(25 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    Stopwatch,
    Pomodoro,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Finished,
}

#[derive(Debug)]
pub struct WritingTimer {
    mode: TimerMode,
    // Accumulated across pauses; the live leg is measured from started_at
    base_elapsed: Duration,
    base_remaining: Duration,
    started_at: Option<Instant>,
    pub custom_minutes: u32,
}

impl Default for WritingTimer {
    fn default() -> Self {
        Self {
            mode: TimerMode::Stopwatch,
            base_elapsed: Duration::ZERO,
            base_remaining: Duration::ZERO,
            started_at: None,
            custom_minutes: 10,
        }
    }
}

impl WritingTimer {
    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Switching modes stops and resets the engine.
    pub fn set_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
        self.started_at = None;
        self.reset();
    }

    pub fn set_custom_minutes(&mut self, minutes: u32) {
        self.custom_minutes = minutes.max(1);
        if self.mode == TimerMode::Custom && !self.is_running() {
            self.base_remaining = Duration::from_secs(u64::from(self.custom_minutes) * 60);
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(t0) = self.started_at.take() {
            let leg = now.duration_since(t0);
            match self.mode {
                TimerMode::Stopwatch => self.base_elapsed += leg,
                TimerMode::Pomodoro | TimerMode::Custom => {
                    self.base_remaining = self.base_remaining.saturating_sub(leg);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.base_elapsed = Duration::ZERO;
        self.base_remaining = match self.mode {
            TimerMode::Stopwatch => Duration::ZERO,
            TimerMode::Pomodoro => POMODORO,
            TimerMode::Custom => Duration::from_secs(u64::from(self.custom_minutes) * 60),
        };
    }

    /// What the display should show right now: elapsed time for the
    /// stopwatch, remaining time for countdowns.
    pub fn display(&self, now: Instant) -> Duration {
        let leg = self
            .started_at
            .map(|t0| now.duration_since(t0))
            .unwrap_or(Duration::ZERO);
        match self.mode {
            TimerMode::Stopwatch => self.base_elapsed + leg,
            TimerMode::Pomodoro | TimerMode::Custom => self.base_remaining.saturating_sub(leg),
        }
    }

    /// Advance the engine; a countdown reaching zero stops it and reports
    /// completion exactly once.
    pub fn tick(&mut self, now: Instant) -> Option<TimerEvent> {
        if self.mode == TimerMode::Stopwatch || self.started_at.is_none() {
            return None;
        }
        if self.display(now) == Duration::ZERO {
            self.pause(now);
            self.base_remaining = Duration::ZERO;
            return Some(TimerEvent::Finished);
        }
        None
    }
}

pub fn format_hms(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}
