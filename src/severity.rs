//! Fixed, totally ordered severity scale used to threshold issues.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildBreakerError;

/// Issue severity, declared from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    /// Every level in ascending order.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Minor,
        Severity::Major,
        Severity::Critical,
        Severity::Blocker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Critical => "CRITICAL",
            Severity::Blocker => "BLOCKER",
        }
    }

    /// Zero-based position of this level on the scale.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

/// Position of `name` on the scale, trimmed and compared case-insensitively.
///
/// Returns `-1` for names that are not on the scale. Callers treat the
/// sentinel as "no threshold", never as the lowest severity.
pub fn index_of(name: &str) -> i32 {
    let name = name.trim();
    Severity::ALL
        .iter()
        .position(|s| s.as_str().eq_ignore_ascii_case(name))
        .map_or(-1, |i| i as i32)
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = BuildBreakerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match index_of(s) {
            i if i >= 0 => Ok(Severity::ALL[i as usize]),
            _ => Err(BuildBreakerError::Config(format!(
                "unknown severity '{}' (expected one of INFO, MINOR, MAJOR, CRITICAL, BLOCKER)",
                s.trim()
            ))),
        }
    }
}

/// The configured issue threshold: a severity, or the explicit "disabled" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Disabled,
    At(Severity),
}

impl Threshold {
    /// Textual form of the disabled marker accepted in configuration.
    pub const DISABLED: &'static str = "Disabled";

    /// Parses a configured threshold. Blank values and `Disabled` turn the
    /// check off; any other name must be on the scale.
    pub fn parse(value: &str) -> Result<Self, BuildBreakerError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(Self::DISABLED) {
            return Ok(Threshold::Disabled);
        }
        value.parse().map(Threshold::At)
    }

    /// Ordinal of the threshold, or the `-1` sentinel when disabled.
    pub fn index(&self) -> i32 {
        match self {
            Threshold::Disabled => -1,
            Threshold::At(severity) => severity.ordinal() as i32,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Disabled => f.write_str(Self::DISABLED),
            Threshold::At(severity) => severity.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_of_is_a_strictly_increasing_bijection() {
        let indices: Vec<i32> = Severity::ALL.iter().map(|s| index_of(s.as_str())).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        for (i, s) in Severity::ALL.iter().enumerate() {
            assert_eq!(s.ordinal(), i);
        }
    }

    #[test]
    fn index_of_trims_and_ignores_case() {
        assert_eq!(index_of("  major "), 2);
        assert_eq!(index_of("Blocker"), 4);
        assert_eq!(index_of("info"), 0);
    }

    #[test]
    fn index_of_unknown_is_negative() {
        assert!(index_of("Disabled") < 0);
        assert!(index_of("") < 0);
        assert!(index_of("SEVERE") < 0);
    }

    #[test]
    fn order_follows_the_scale() {
        assert!(Severity::Info < Severity::Minor);
        assert!(Severity::Critical < Severity::Blocker);
        let mut shuffled = vec![Severity::Blocker, Severity::Info, Severity::Major];
        shuffled.sort();
        assert_eq!(shuffled, vec![Severity::Info, Severity::Major, Severity::Blocker]);
    }

    #[test]
    fn from_str_fails_explicitly_on_unknown() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        let err = "urgent".parse::<Severity>().unwrap_err();
        assert!(err.to_string().contains("urgent"));
    }

    #[test]
    fn threshold_parse() {
        assert_eq!(Threshold::parse("Disabled").unwrap(), Threshold::Disabled);
        assert_eq!(Threshold::parse("DISABLED").unwrap(), Threshold::Disabled);
        assert_eq!(Threshold::parse("   ").unwrap(), Threshold::Disabled);
        assert_eq!(
            Threshold::parse("major").unwrap(),
            Threshold::At(Severity::Major)
        );
        assert!(Threshold::parse("sometimes").is_err());
    }

    #[test]
    fn threshold_index_uses_sentinel() {
        assert_eq!(Threshold::Disabled.index(), -1);
        assert_eq!(Threshold::At(Severity::Critical).index(), 3);
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, r#""CRITICAL""#);
        let parsed: Severity = serde_json::from_str(r#""MINOR""#).unwrap();
        assert_eq!(parsed, Severity::Minor);
    }
}
