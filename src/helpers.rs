//! Shared helpers: Decimal ↔ f64 conversions and unit-system conversions.
//!
//! Weather values are converted to the user's unit preference *before*
//! formatting, never after — the formatter only ever sees numbers in the
//! target system.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's unit preference, stored on the route as `metric`/`imperial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Parse from the stored/inbound keyword. Unrecognized input is None —
    /// callers decide whether to default or reject.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Some(UnitSystem::Metric),
            "imperial" => Some(UnitSystem::Imperial),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub(crate) fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub(crate) fn ms_to_kmh(ms: f64) -> f64 {
    ms * 3.6
}

pub(crate) fn kmh_to_mph(kmh: f64) -> f64 {
    kmh / 1.609344
}

pub(crate) fn mm_to_inches(mm: f64) -> f64 {
    mm / 25.4
}

pub(crate) fn metres_to_feet(m: f64) -> f64 {
    m * 3.28084
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_unit_system_parse() {
        assert_eq!(UnitSystem::parse("metric"), Some(UnitSystem::Metric));
        assert_eq!(UnitSystem::parse(" IMPERIAL "), Some(UnitSystem::Imperial));
        assert_eq!(UnitSystem::parse("furlongs"), None);
    }

    #[test]
    fn test_unit_system_roundtrip() {
        assert_eq!(
            UnitSystem::parse(UnitSystem::Metric.as_str()),
            Some(UnitSystem::Metric)
        );
    }

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("3.14").unwrap();
        assert!((dec_to_f64(d) - 3.14).abs() < 1e-10);
    }

    #[test]
    fn test_dec_to_f64_zero() {
        assert_eq!(dec_to_f64(Decimal::ZERO), 0.0);
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-10);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-10);
        assert!((celsius_to_fahrenheit(-40.0) - -40.0).abs() < 1e-10);
    }

    #[test]
    fn test_ms_to_kmh() {
        assert!((ms_to_kmh(10.0) - 36.0).abs() < 1e-10);
    }

    #[test]
    fn test_kmh_to_mph() {
        assert!((kmh_to_mph(1.609344) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_mm_to_inches() {
        assert!((mm_to_inches(25.4) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_metres_to_feet() {
        assert!((metres_to_feet(1000.0) - 3280.84).abs() < 1e-6);
    }
}
