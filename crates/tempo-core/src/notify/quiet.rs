//! Quiet windows: recurring time-of-day intervals that hold back
//! non-escalating notifications.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// What happens to a notification that lands in a quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuietPolicy {
    /// Drop it
    Suppress,
    /// Move its delivery to the end of the window
    Defer,
}

/// A daily interval `[start, end)`; wraps past midnight when `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietWindow {
    #[serde(with = "hh_mm")]
    pub start: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end: NaiveTime,
    pub policy: QuietPolicy,
}

impl QuietWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, policy: QuietPolicy) -> Self {
        Self { start, end, policy }
    }

    /// Build from "HH:MM" strings.
    pub fn parse(start: &str, end: &str, policy: QuietPolicy) -> Result<Self> {
        Ok(Self::new(parse_hh_mm(start)?, parse_hh_mm(end)?, policy))
    }

    /// The 22:00-07:00 deferring window used when nothing is configured.
    pub fn overnight() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            QuietPolicy::Defer,
        )
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    /// Whether the clock time of `at` is inside the window. A window whose
    /// start equals its end is empty.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let time = at.time();
        if self.start == self.end {
            false
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    /// First instant at or after `at` where the window closes.
    pub fn occurrence_end(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let same_day = Utc.from_utc_datetime(&at.date_naive().and_time(self.end));
        if same_day > at {
            same_day
        } else {
            same_day + Duration::days(1)
        }
    }
}

fn parse_hh_mm(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M").map_err(|e| {
        ValidationError::InvalidValue {
            field: "quiet_window".to_string(),
            message: format!("'{text}' is not an HH:MM time: {e}"),
        }
        .into()
    })
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(text.trim(), "%H:%M").map_err(serde::de::Error::custom)
    }
}
