//! Energy curve types and presets.
//!
//! An energy curve maps each hour of the day to a capacity weight in
//! [0.0, 1.0]. The slot allocator multiplies it into candidate-start scores.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::task::Priority;

const MORNING_PERSON: [f64; 24] = [
    0.05, 0.05, 0.05, 0.05, 0.05, 0.05, // 00-05
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, // 06-11
    0.8, 0.7, 0.6, 0.6, 0.5, 0.4, // 12-17
    0.3, 0.3, 0.2, 0.1, 0.05, 0.05, // 18-23
];

const NIGHT_OWL: [f64; 24] = [
    1.0, 1.0, 1.0, 0.3, 0.05, 0.05, // 00-05
    0.05, 0.05, 0.05, 0.05, 0.2, 0.3, // 06-11
    0.4, 0.5, 0.6, 0.6, 0.7, 0.8, // 12-17
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, // 18-23
];

/// Declared chronotype, or explicit per-hour weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EnergyProfile {
    MorningPerson,
    NightOwl,
    Steady,
    Custom {
        /// Hour of day (0-23) -> weight; all 24 hours required
        #[serde(with = "hour_keys")]
        weights: BTreeMap<u8, f64>,
    },
}

impl Default for EnergyProfile {
    fn default() -> Self {
        EnergyProfile::Steady
    }
}

impl EnergyProfile {
    /// Parse a preset name ("morning-person", "night-owl", "steady").
    pub fn from_preset_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "morning-person" | "morning" => Some(EnergyProfile::MorningPerson),
            "night-owl" | "night" => Some(EnergyProfile::NightOwl),
            "steady" => Some(EnergyProfile::Steady),
            _ => None,
        }
    }

    /// Resolve into a full 24-hour curve.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnergyCurve` when a custom map has an hour key outside
    /// 0-23, a weight outside [0.0, 1.0], or a missing hour.
    pub fn resolve(&self) -> Result<EnergyCurve> {
        match self {
            EnergyProfile::MorningPerson => Ok(EnergyCurve {
                weights: MORNING_PERSON,
            }),
            EnergyProfile::NightOwl => Ok(EnergyCurve { weights: NIGHT_OWL }),
            EnergyProfile::Steady => {
                let mut weights = [0.0; 24];
                for w in weights.iter_mut().take(23).skip(7) {
                    *w = 1.0;
                }
                Ok(EnergyCurve { weights })
            }
            EnergyProfile::Custom { weights } => EnergyCurve::from_map(weights),
        }
    }
}

/// Resolved capacity weights for every hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyCurve {
    weights: [f64; 24],
}

impl EnergyCurve {
    /// Build a curve from an explicit hour -> weight map.
    pub fn from_map(map: &BTreeMap<u8, f64>) -> Result<Self> {
        let mut weights = [f64::NAN; 24];
        for (&hour, &weight) in map {
            if hour > 23 {
                return Err(invalid(format!("hour {hour} is outside 0-23")));
            }
            if !(0.0..=1.0).contains(&weight) {
                return Err(invalid(format!(
                    "weight {weight} for hour {hour} is outside [0.0, 1.0]"
                )));
            }
            weights[hour as usize] = weight;
        }
        if let Some(hour) = weights.iter().position(|w| w.is_nan()) {
            return Err(invalid(format!("no weight defined for hour {hour}")));
        }
        Ok(Self { weights })
    }

    /// Capacity weight for an hour of day. Hours wrap modulo 24.
    pub fn weight(&self, hour: u32) -> f64 {
        self.weights[(hour % 24) as usize]
    }

    /// Capacity weight at the clock hour of a timestamp.
    pub fn weight_at(&self, at: DateTime<Utc>) -> f64 {
        self.weight(at.hour())
    }

    /// All 24 weights, index = hour.
    pub fn weights(&self) -> &[f64; 24] {
        &self.weights
    }

    /// Hours whose weight is at least `min_weight`, ascending.
    pub fn peak_hours(&self, min_weight: f64) -> Vec<u8> {
        (0u8..24)
            .filter(|h| self.weights[*h as usize] >= min_weight)
            .collect()
    }

    /// Focus level a task needs when started at `at`.
    pub fn focus_level(&self, priority: Priority, at: DateTime<Utc>) -> FocusLevel {
        if priority.is_high() {
            return FocusLevel::High;
        }
        let weight = self.weight_at(at);
        if weight >= 0.75 {
            FocusLevel::High
        } else if weight >= 0.4 {
            FocusLevel::Medium
        } else {
            FocusLevel::Low
        }
    }

    /// Render the curve as an ASCII bar chart.
    pub fn render_ascii_chart(&self, title: &str) -> String {
        let mut output = format!("\n{} Energy Curve:\n", title);
        output.push_str(&"─".repeat(44));
        output.push('\n');

        for hour in 0..24 {
            let weight = self.weights[hour];
            let bar_length = (weight * 30.0).round() as usize;
            output.push_str(&format!(
                "{:02}:00 {}{} {:>3.0}%\n",
                hour,
                "█".repeat(bar_length),
                " ".repeat(30 - bar_length),
                weight * 100.0
            ));
        }

        output.push_str(&"─".repeat(44));
        output.push('\n');
        output
    }
}

/// Concentration a scheduled entry calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusLevel {
    Low,
    Medium,
    High,
}

fn invalid(reason: String) -> CoreError {
    CoreError::InvalidEnergyCurve { reason }
}

/// Hour maps are written with string keys so they survive TOML, whose
/// table keys are always strings.
mod hour_keys {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &BTreeMap<u8, f64>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(map.iter().map(|(hour, weight)| (hour.to_string(), *weight)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<u8, f64>, D::Error> {
        BTreeMap::<String, f64>::deserialize(d)?
            .into_iter()
            .map(|(hour, weight)| {
                hour.trim()
                    .parse::<u8>()
                    .map(|h| (h, weight))
                    .map_err(|_| D::Error::custom(format!("hour key '{hour}' is not 0-255")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn full_map(weight: f64) -> BTreeMap<u8, f64> {
        (0u8..24).map(|h| (h, weight)).collect()
    }

    #[test]
    fn morning_person_peaks_before_noon() {
        let curve = EnergyProfile::MorningPerson.resolve().unwrap();
        for hour in 6..12 {
            assert_eq!(curve.weight(hour), 1.0);
        }
        for hour in [22, 23, 0, 3, 5] {
            assert!(curve.weight(hour) < 0.1, "hour {hour} should be near zero");
        }
        assert_eq!(curve.peak_hours(1.0), vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn night_owl_peaks_late() {
        let curve = EnergyProfile::NightOwl.resolve().unwrap();
        for hour in [18, 19, 20, 21, 22, 23, 0, 1, 2] {
            assert_eq!(curve.weight(hour), 1.0);
        }
        assert!(curve.weight(7) < 0.1);
    }

    #[test]
    fn steady_is_uniform_over_waking_hours() {
        let curve = EnergyProfile::Steady.resolve().unwrap();
        for hour in 7..=22 {
            assert_eq!(curve.weight(hour), 1.0);
        }
        for hour in [23, 0, 1, 6] {
            assert_eq!(curve.weight(hour), 0.0);
        }
    }

    #[test]
    fn custom_curve_accepts_complete_map() {
        let mut map = full_map(0.5);
        map.insert(9, 0.9);
        let curve = EnergyProfile::Custom { weights: map }.resolve().unwrap();
        assert_eq!(curve.weight(9), 0.9);
        assert_eq!(curve.weight(10), 0.5);
    }

    #[test]
    fn custom_curve_rejects_bad_input() {
        let mut out_of_range = full_map(0.5);
        out_of_range.insert(24, 0.5);
        assert!(matches!(
            EnergyCurve::from_map(&out_of_range),
            Err(CoreError::InvalidEnergyCurve { .. })
        ));

        let mut negative = full_map(0.5);
        negative.insert(3, -0.1);
        assert!(EnergyCurve::from_map(&negative).is_err());

        let mut missing = full_map(0.5);
        missing.remove(&12);
        let err = EnergyCurve::from_map(&missing).unwrap_err();
        assert!(err.to_string().contains("hour 12"));
    }

    #[test]
    fn profile_serializes_with_kebab_kind() {
        let json = serde_json::to_string(&EnergyProfile::NightOwl).unwrap();
        assert_eq!(json, r#"{"kind":"night-owl"}"#);
        assert_eq!(
            EnergyProfile::from_preset_name("Morning_Person"),
            Some(EnergyProfile::MorningPerson)
        );
    }

    #[test]
    fn custom_profile_survives_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            energy: EnergyProfile,
        }
        let wrapper = Wrapper {
            energy: EnergyProfile::Custom {
                weights: full_map(0.25),
            },
        };
        let text = toml::to_string(&wrapper).unwrap();
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.energy, wrapper.energy);
    }

    #[test]
    fn focus_level_follows_priority_then_energy() {
        let curve = EnergyProfile::MorningPerson.resolve().unwrap();
        let nine = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let three_pm = Utc.with_ymd_and_hms(2025, 3, 3, 15, 0, 0).unwrap();
        let nine_pm = Utc.with_ymd_and_hms(2025, 3, 3, 21, 0, 0).unwrap();
        assert_eq!(curve.focus_level(Priority::Urgent, nine_pm), FocusLevel::High);
        assert_eq!(curve.focus_level(Priority::Low, nine), FocusLevel::High);
        assert_eq!(curve.focus_level(Priority::Low, three_pm), FocusLevel::Medium);
        assert_eq!(curve.focus_level(Priority::Low, nine_pm), FocusLevel::Low);
    }

    #[test]
    fn ascii_chart_has_a_row_per_hour() {
        let curve = EnergyProfile::Steady.resolve().unwrap();
        let chart = curve.render_ascii_chart("Steady");
        assert!(chart.contains("Steady Energy Curve"));
        assert!(chart.contains("09:00"));
        assert!(chart.contains("23:00"));
    }
}
