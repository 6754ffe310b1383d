//! Date arithmetic exposed to workflows.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serializer;

/// Time step units accepted by `AddTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Member names in declaration order, as surfaced to the LLM.
    pub const MEMBERS: [&'static str; 5] = ["Seconds", "Minutes", "Hours", "Days", "Weeks"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "seconds" => Some(Self::Seconds),
            "minutes" => Some(Self::Minutes),
            "hours" => Some(Self::Hours),
            "days" => Some(Self::Days),
            "weeks" => Some(Self::Weeks),
            _ => None,
        }
    }

    pub fn seconds_per_unit(&self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3_600.0,
            Self::Days => 86_400.0,
            Self::Weeks => 604_800.0,
        }
    }
}

/// Shift `date` by a signed amount of `unit` steps. Sub-second remainders
/// are kept at millisecond precision.
pub fn add_time(date: DateTime<Utc>, value: f64, unit: TimeUnit) -> DateTime<Utc> {
    let millis = (value * unit.seconds_per_unit() * 1_000.0) as i64;
    date + Duration::milliseconds(millis)
}

/// Serialize instants in the wire format workflows exchange.
pub(crate) fn serialize_instant<S>(
    instant: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_add_time_by_days() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let shifted = add_time(start, 1.0, TimeUnit::Days);
        assert_eq!(shifted, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_add_time_accepts_negative_and_fractional_values() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(
            add_time(start, -12.0, TimeUnit::Hours),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            add_time(start, 0.5, TimeUnit::Minutes),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap()
        );
    }

    #[test]
    fn test_unit_names_resolve_case_insensitively() {
        assert_eq!(TimeUnit::from_name("days"), Some(TimeUnit::Days));
        assert_eq!(TimeUnit::from_name(" WEEKS "), Some(TimeUnit::Weeks));
        assert_eq!(TimeUnit::from_name("fortnights"), None);
    }
}
