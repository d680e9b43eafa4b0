//! Day credit resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Work-unit credit earned for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayCredit {
    Full,
    Half,
    None,
}

impl DayCredit {
    /// Maps a work-unit value: `>= 1` is full, `>= 0.5` is half, else none.
    #[must_use]
    pub fn from_work_unit(unit: f64) -> Self {
        if unit >= 1.0 {
            Self::Full
        } else if unit >= 0.5 {
            Self::Half
        } else {
            Self::None
        }
    }

    /// The credit in work-units.
    #[must_use]
    pub const fn units(self) -> f64 {
        match self {
            Self::Full => 1.0,
            Self::Half => 0.5,
            Self::None => 0.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Half => "HALF",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for DayCredit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds() {
        assert_eq!(DayCredit::from_work_unit(1.0), DayCredit::Full);
        assert_eq!(DayCredit::from_work_unit(1.5), DayCredit::Full);
        assert_eq!(DayCredit::from_work_unit(0.5), DayCredit::Half);
        assert_eq!(DayCredit::from_work_unit(0.9), DayCredit::Half);
        assert_eq!(DayCredit::from_work_unit(0.4), DayCredit::None);
        assert_eq!(DayCredit::from_work_unit(0.0), DayCredit::None);
    }
}
