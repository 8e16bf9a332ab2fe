//! Volume as an integer percentage with a normalized gain

/// Playback volume
///
/// The engine takes 0-100 percent and hands the backend a linear gain in
/// `[0.0, 1.0]`. Ducking steps through this same scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Volume level (0-100)
    level: u8,

    /// Cached linear gain multiplier
    gain: f32,
}

impl Volume {
    /// Full volume
    pub const MAX: u8 = 100;

    pub fn new(level: u8) -> Self {
        let level = level.min(Self::MAX);
        Self {
            level,
            gain: Self::gain_for(level),
        }
    }

    /// Set volume level (0-100, clamped)
    pub fn set_level(&mut self, level: u8) {
        *self = Self::new(level);
    }

    /// Current volume level (0-100)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Linear gain for the backend
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Recover a percentage from a backend gain
    pub fn level_from_gain(gain: f32) -> u8 {
        (gain.clamp(0.0, 1.0) * f32::from(Self::MAX)).round() as u8
    }

    fn gain_for(level: u8) -> f32 {
        f32::from(level) / f32::from(Self::MAX)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Self::MAX)
    }
}
