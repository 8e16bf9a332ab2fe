//! Audio focus changes and the ducking ramp
//!
//! Ducking lowers the volume in small steps while another app briefly holds
//! audio focus and raises it again afterwards. The ramp is a plain state
//! machine; the session owns the timer and calls [`Ducker::step`] each
//! `duck_step_interval` while [`Ducker::is_ramping`] holds.

use serde::{Deserialize, Serialize};

/// Audio focus change reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusChange {
    /// Focus (re)gained
    Gain,

    /// Focus lost for an unbounded time
    Loss,

    /// Focus lost briefly; playback should pause and may resume
    LossTransient,

    /// Focus lost briefly; playback may continue at a lower volume
    LossTransientCanDuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ramp {
    Down,
    Up,
}

/// Ducking ramp state
#[derive(Debug, Clone)]
pub struct Ducker {
    /// Current volume percentage
    level: u8,

    ramp: Option<Ramp>,

    /// Preference: duck at all
    enabled: bool,
}

impl Ducker {
    /// Lowest ducked level
    pub const FLOOR: u8 = 20;

    /// Decrement per step while ducking
    pub const DOWN_STEP: u8 = 5;

    /// Increment per step while unducking
    pub const UP_STEP: u8 = 3;

    pub fn new(enabled: bool) -> Self {
        Self {
            level: 100,
            ramp: None,
            enabled,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Update the ducking preference; disabling snaps back to full volume
    pub fn set_enabled(&mut self, enabled: bool) -> Option<u8> {
        self.enabled = enabled;
        if enabled {
            return None;
        }
        self.ramp = None;
        self.level = 100;
        Some(self.level)
    }

    /// Start ramping down and take the first step
    pub fn duck(&mut self) -> u8 {
        self.ramp = Some(Ramp::Down);
        self.step().unwrap_or(self.level)
    }

    /// Start ramping up and take the first step
    pub fn unduck(&mut self) -> u8 {
        self.ramp = Some(Ramp::Up);
        self.step().unwrap_or(self.level)
    }

    /// Advance the active ramp by one step, returning the new level
    pub fn step(&mut self) -> Option<u8> {
        let ramp = self.ramp?;
        if !self.enabled {
            self.level = 100;
            self.ramp = None;
            return Some(self.level);
        }

        match ramp {
            Ramp::Down => {
                self.level = self.level.saturating_sub(Self::DOWN_STEP);
                if self.level <= Self::FLOOR {
                    self.level = Self::FLOOR;
                    self.ramp = None;
                }
            }
            Ramp::Up => {
                self.level = self.level.saturating_add(Self::UP_STEP).min(100);
                if self.level >= 100 {
                    self.ramp = None;
                }
            }
        }
        Some(self.level)
    }
}

impl Default for Ducker {
    fn default() -> Self {
        Self::new(true)
    }
}
