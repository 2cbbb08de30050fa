//! Scheduler configuration.

use std::time::Duration;

use matchforge_protocol::GameMode;
use tracing::warn;

/// One matchmaking mode and how many players make a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub mode: GameMode,
    pub party_size: usize,
}

impl ModeConfig {
    pub fn new(mode: GameMode, party_size: usize) -> Self {
        Self { mode, party_size }
    }
}

/// Full configuration for the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How long the loop sleeps after a pass that formed no room.
    pub poll_interval: Duration,
    /// Supported modes, swept in this order.
    pub modes: Vec<ModeConfig>,
}

impl Default for SchedulerConfig {
    /// One 1v1 mode, polled every second.
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            modes: vec![ModeConfig::new(GameMode::DEFAULT, 2)],
        }
    }
}

impl SchedulerConfig {
    /// Shortest allowed poll interval.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Adds a mode. Builder-style.
    pub fn with_mode(mut self, mode: GameMode, party_size: usize) -> Self {
        self.modes.push(ModeConfig::new(mode, party_size));
        self
    }

    /// Sets the idle poll interval. Builder-style.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by [`Scheduler::new`](crate::Scheduler::new). Rules:
    /// - `poll_interval` is at least [`Self::MIN_POLL_INTERVAL`].
    /// - `party_size` is at least 1.
    /// - A mode listed twice keeps its first entry.
    pub fn validated(mut self) -> Self {
        if self.poll_interval < Self::MIN_POLL_INTERVAL {
            warn!(
                poll_interval_us = self.poll_interval.as_micros() as u64,
                "poll_interval too short, clamping"
            );
            self.poll_interval = Self::MIN_POLL_INTERVAL;
        }

        let mut seen = Vec::with_capacity(self.modes.len());
        self.modes.retain(|entry| {
            if seen.contains(&entry.mode) {
                warn!(mode = %entry.mode, "duplicate mode ignored");
                return false;
            }
            seen.push(entry.mode);
            true
        });

        for entry in &mut self.modes {
            if entry.party_size == 0 {
                warn!(mode = %entry.mode, "party_size of 0, using 1");
                entry.party_size = 1;
            }
        }
        self
    }
}
