use crate::config::LosThreshold;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highway Capacity Manual level of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Los {
    A,
    B,
    C,
    D,
    E,
    F,
    /// The V/C ratio was undefined (no capacity).
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Los {
    pub const GRADES: [Los; 6] = [Los::A, Los::B, Los::C, Los::D, Los::E, Los::F];

    pub fn as_str(&self) -> &'static str {
        match self {
            Los::A => "A",
            Los::B => "B",
            Los::C => "C",
            Los::D => "D",
            Los::E => "E",
            Los::F => "F",
            Los::NotApplicable => "N/A",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Los::A => "Free flow",
            Los::B => "Reasonably free flow",
            Los::C => "Stable flow",
            Los::D => "Approaching unstable flow",
            Los::E => "Unstable flow",
            Los::F => "Forced flow / Breakdown",
            Los::NotApplicable => "No capacity",
        }
    }
}

impl fmt::Display for Los {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a V/C ratio into a level of service.
///
/// Scans `thresholds` in order and returns the first grade whose upper
/// bound is at or above `vc`. With the default table:
///
/// | V/C         | LOS |
/// |-------------|-----|
/// | <= 0.35     | A   |
/// | <= 0.54     | B   |
/// | <= 0.77     | C   |
/// | <= 0.93     | D   |
/// | <= 1.00     | E   |
/// | > 1.00      | F   |
///
/// An undefined ratio grades as [`Los::NotApplicable`].
pub fn los_from_vc(vc: Option<f64>, thresholds: &[LosThreshold]) -> Los {
    let Some(vc) = vc else {
        return Los::NotApplicable;
    };

    thresholds
        .iter()
        .find(|t| t.upper_bound.is_none_or(|bound| vc <= bound))
        .map(|t| t.grade)
        .unwrap_or(Los::F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    fn grade(vc: f64) -> Los {
        los_from_vc(Some(vc), &AnalysisConfig::default().los_thresholds)
    }

    #[test]
    fn test_los_boundaries() {
        assert_eq!(grade(0.00), Los::A);
        assert_eq!(grade(0.35), Los::A);
        assert_eq!(grade(0.350001), Los::B);
        assert_eq!(grade(0.54), Los::B);
        assert_eq!(grade(0.55), Los::C);
        assert_eq!(grade(0.75), Los::C);
        assert_eq!(grade(0.77), Los::C);
        assert_eq!(grade(0.93), Los::D);
        assert_eq!(grade(0.98), Los::E);
        assert_eq!(grade(1.00), Los::E);
        assert_eq!(grade(1.000001), Los::F);
        assert_eq!(grade(2.5), Los::F);
    }

    #[test]
    fn test_undefined_ratio_is_not_applicable() {
        let los = los_from_vc(None, &AnalysisConfig::default().los_thresholds);
        assert_eq!(los, Los::NotApplicable);
        assert_eq!(los.to_string(), "N/A");
    }

    #[test]
    fn test_custom_table() {
        let thresholds = vec![
            LosThreshold {
                grade: Los::A,
                upper_bound: Some(0.5),
            },
            LosThreshold {
                grade: Los::F,
                upper_bound: None,
            },
        ];
        assert_eq!(los_from_vc(Some(0.5), &thresholds), Los::A);
        assert_eq!(los_from_vc(Some(0.6), &thresholds), Los::F);
    }
}
