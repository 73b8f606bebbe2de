//! Fare calculation

use serde::{Deserialize, Serialize};

const DEFAULT_BASE_FARE: f64 = 1000.0;
const DEFAULT_PER_MINUTE_RATE: f64 = 50.0;
const DEFAULT_PER_KILOMETER_RATE: f64 = 100.0;

/// Fare configuration: a flat start fee plus time and distance rates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    #[serde(alias = "baseFare")]
    pub base_fare: f64,
    /// Charged per minute of running time
    #[serde(alias = "perMinuteRate")]
    pub per_minute_rate: f64,
    /// Charged per kilometer traveled
    #[serde(alias = "perKilometerRate")]
    pub per_kilometer_rate: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            base_fare: DEFAULT_BASE_FARE,
            per_minute_rate: DEFAULT_PER_MINUTE_RATE,
            per_kilometer_rate: DEFAULT_PER_KILOMETER_RATE,
        }
    }
}

impl Tariff {
    pub fn new(base_fare: f64, per_minute_rate: f64, per_kilometer_rate: f64) -> Self {
        Self {
            base_fare,
            per_minute_rate,
            per_kilometer_rate,
        }
    }

    /// Fare in whole currency units, rounded half away from zero
    pub fn fare(&self, elapsed_millis: u64, distance_meters: f64) -> i64 {
        let minutes = elapsed_millis as f64 / 60_000.0;
        let km = distance_meters / 1000.0;

        (self.base_fare + minutes * self.per_minute_rate + km * self.per_kilometer_rate).round()
            as i64
    }

    /// Every rate must be a finite, non-negative amount
    pub fn validate(&self) -> Result<(), String> {
        let rates = [
            ("base_fare", self.base_fare),
            ("per_minute_rate", self.per_minute_rate),
            ("per_kilometer_rate", self.per_kilometer_rate),
        ];

        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("`{}` must be a non-negative number, got {}", name, value));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Tariff;

    #[test]
    fn base_fare_only() {
        assert_eq!(1000, Tariff::default().fare(0, 0.0));
    }

    #[test]
    fn two_minutes_three_km() {
        assert_eq!(1400, Tariff::default().fare(120_000, 3_000.0));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 1000 + 0.5
        let tariff = Tariff::new(1000.0, 0.0, 1.0);
        assert_eq!(1001, tariff.fare(0, 500.0));
        assert_eq!(1000, tariff.fare(0, 499.0));
    }

    #[test]
    fn partial_minute() {
        // 30s at 50/min is 25
        assert_eq!(1025, Tariff::default().fare(30_000, 0.0));
    }

    #[test]
    fn rejects_negative_rates() {
        assert!(Tariff::default().validate().is_ok());
        assert!(Tariff::new(-1.0, 50.0, 100.0).validate().is_err());
        assert!(Tariff::new(1000.0, f64::NAN, 100.0).validate().is_err());
    }

    #[test]
    fn camel_case_options() -> Result<(), String> {
        let yaml = "baseFare: 500\nperMinuteRate: 10";
        let tariff: Tariff = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        assert_eq!(Tariff::new(500.0, 10.0, 100.0), tariff);

        Ok(())
    }
}
