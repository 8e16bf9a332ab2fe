//! Shuffle and repeat modes
//!
//! Both modes are persisted as small integers in the preference store, so
//! each carries a stable code alongside its serde representation.

use serde::{Deserialize, Serialize};

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Play the queue in its original order
    #[default]
    Off,

    /// Play a shuffled permutation of the queue
    On,
}

impl ShuffleMode {
    /// Stable integer code used for persistence
    pub fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Decode a persisted code, treating unknown values as `Off`
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            Self::On
        } else {
            Self::Off
        }
    }

    /// The opposite mode
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop entire queue
    All,

    /// Loop current track only
    One,
}

impl RepeatMode {
    /// Stable integer code used for persistence
    pub fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::All => 1,
            Self::One => 2,
        }
    }

    /// Decode a persisted code, treating unknown values as `Off`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::All,
            2 => Self::One,
            _ => Self::Off,
        }
    }

    /// Next mode in the off → all → one → off cycle
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

impl std::str::FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "all" => Ok(Self::All),
            "one" | "this" => Ok(Self::One),
            other => Err(format!("unknown repeat mode: {other}")),
        }
    }
}

impl std::str::FromStr for ShuffleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "on" | "shuffle" => Ok(Self::On),
            other => Err(format!("unknown shuffle mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_through_all_modes() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
    }

    #[test]
    fn codes_survive_persistence() {
        for mode in [RepeatMode::Off, RepeatMode::All, RepeatMode::One] {
            assert_eq!(RepeatMode::from_code(mode.code()), mode);
        }
        for mode in [ShuffleMode::Off, ShuffleMode::On] {
            assert_eq!(ShuffleMode::from_code(mode.code()), mode);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_off() {
        assert_eq!(RepeatMode::from_code(-1), RepeatMode::Off);
        assert_eq!(ShuffleMode::from_code(7), ShuffleMode::Off);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("ALL".parse::<RepeatMode>().unwrap(), RepeatMode::All);
        assert_eq!("on".parse::<ShuffleMode>().unwrap(), ShuffleMode::On);
        assert!("sometimes".parse::<RepeatMode>().is_err());
    }
}
