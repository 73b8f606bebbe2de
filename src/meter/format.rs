//! Display formatting for meter readings

use num_format::{Locale, ToFormattedString};

use super::state::MeterSnapshot;
use super::tariff::Tariff;

/// Elapsed time as zero-padded `HH:MM:SS`
pub fn format_elapsed(elapsed_millis: u64) -> String {
    let total = elapsed_millis / 1000;

    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Whole meters below one kilometer, kilometers with two decimals above
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.2}km", meters / 1000.0)
    }
}

/// Fare with thousands grouping, e.g. `¥1,400`
pub fn format_fare(fare: i64, currency: &str) -> String {
    format!("{}{}", currency, fare.to_formatted_string(&Locale::en))
}

pub fn format_speed(kmh: f64) -> String {
    format!("{} km/h", kmh.round())
}

/// Rate card line, e.g. `base ¥1,000 · ¥50/min · ¥100/km`
pub fn format_tariff(tariff: &Tariff, currency: &str) -> String {
    format!(
        "base {} · {}{}/min · {}{}/km",
        format_fare(tariff.base_fare.round() as i64, currency),
        currency,
        tariff.per_minute_rate,
        currency,
        tariff.per_kilometer_rate
    )
}

/// Single status line for a snapshot
pub fn format_snapshot(snapshot: &MeterSnapshot, currency: &str) -> String {
    format!(
        "[{}] {}  {}  {}  {}",
        snapshot.phase,
        format_fare(snapshot.estimated_fare, currency),
        format_elapsed(snapshot.elapsed_millis),
        format_distance(snapshot.total_distance_meters),
        format_speed(snapshot.current_speed_kmh)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::state::{MeterSnapshot, Phase};

    #[test]
    fn elapsed() {
        assert_eq!("00:00:00", format_elapsed(0));
        assert_eq!("00:00:59", format_elapsed(59_999));
        assert_eq!("00:02:00", format_elapsed(120_000));
        assert_eq!("01:01:01", format_elapsed(3_661_000));
        assert_eq!("100:00:00", format_elapsed(360_000_000));
    }

    #[test]
    fn distance() {
        assert_eq!("0m", format_distance(0.0));
        assert_eq!("999m", format_distance(999.4));
        assert_eq!("1.00km", format_distance(1000.0));
        assert_eq!("1.43km", format_distance(1432.556));
        assert_eq!("12.35km", format_distance(12_345.6));
    }

    #[test]
    fn fare() {
        assert_eq!("¥1,400", format_fare(1400, "¥"));
        assert_eq!("$999", format_fare(999, "$"));
        assert_eq!("¥1,234,567", format_fare(1_234_567, "¥"));
    }

    #[test]
    fn speed() {
        assert_eq!("36 km/h", format_speed(36.0));
        assert_eq!("0 km/h", format_speed(0.0));
        assert_eq!("19 km/h", format_speed(18.72));
    }

    #[test]
    fn tariff_line() {
        assert_eq!("base ¥1,000 · ¥50/min · ¥100/km", format_tariff(&Tariff::default(), "¥"));
    }

    #[test]
    fn snapshot_line() {
        let snap = MeterSnapshot {
            phase: Phase::Running,
            estimated_fare: 1400,
            elapsed_millis: 120_000,
            total_distance_meters: 3000.0,
            current_speed_kmh: 36.0,
            last_position: None,
        };

        assert_eq!("[running] ¥1,400  00:02:00  3.00km  36 km/h", format_snapshot(&snap, "¥"));
    }
}
