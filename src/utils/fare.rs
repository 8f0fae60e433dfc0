use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::car_category;

/// How the per-km rate of a tariff relates to the category capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScaling {
    /// `rate = price_per_km`
    #[default]
    Flat,
    /// `rate = price_per_km * capacity`
    ByCapacity,
}

impl FromStr for RateScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(RateScaling::Flat),
            "capacity" | "by_capacity" => Ok(RateScaling::ByCapacity),
            other => Err(format!("unknown rate scaling '{}'", other)),
        }
    }
}

impl fmt::Display for RateScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateScaling::Flat => write!(f, "flat"),
            RateScaling::ByCapacity => write!(f, "capacity"),
        }
    }
}

/// Pricing parameters of a car category
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tariff {
    pub base_fare: f64,
    pub price_per_km: f64,
    pub minimum_fare: f64,
    pub capacity: i32,
}

impl From<&car_category::Model> for Tariff {
    fn from(category: &car_category::Model) -> Self {
        Self {
            base_fare: category.base_fare,
            price_per_km: category.price_per_km,
            minimum_fare: category.minimum_fare,
            capacity: category.capacity,
        }
    }
}

impl Tariff {
    pub fn rate_per_km(&self, scaling: RateScaling) -> f64 {
        match scaling {
            RateScaling::Flat => self.price_per_km,
            RateScaling::ByCapacity => self.price_per_km * f64::from(self.capacity),
        }
    }

    /// `max(base + distance * rate, minimum_fare)`
    pub fn fare(&self, distance_km: f64, scaling: RateScaling) -> f64 {
        let fare = self.base_fare + distance_km * self.rate_per_km(scaling);
        fare.max(self.minimum_fare)
    }
}

/// Round a currency amount to cents
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::geo::haversine_distance;

    fn standard() -> Tariff {
        Tariff {
            base_fare: 2.5,
            price_per_km: 1.2,
            minimum_fare: 5.0,
            capacity: 4,
        }
    }

    #[test]
    fn zero_distance_is_base_or_minimum() {
        let t = standard();
        assert_eq!(t.fare(0.0, RateScaling::Flat), 5.0);

        let cheap_minimum = Tariff {
            minimum_fare: 1.0,
            ..t
        };
        assert_eq!(cheap_minimum.fare(0.0, RateScaling::Flat), 2.5);
    }

    #[test]
    fn fare_never_below_minimum() {
        let t = standard();
        for d in [0.0, 0.1, 0.5, 1.0, 2.0, 2.08, 3.0, 10.0, 250.0] {
            assert!(t.fare(d, RateScaling::Flat) >= t.minimum_fare);
            assert!(t.fare(d, RateScaling::ByCapacity) >= t.minimum_fare);
        }
    }

    #[test]
    fn short_city_trip_is_clamped_to_minimum() {
        let distance = haversine_distance(-1.9441, 30.0619, -1.9500, 30.0700);
        let fare = standard().fare(distance, RateScaling::Flat);
        assert_eq!(fare, 5.0);
    }

    #[test]
    fn long_trip_is_linear() {
        let t = standard();
        assert!((t.fare(10.0, RateScaling::Flat) - 14.5).abs() < 1e-9);
    }

    #[test]
    fn capacity_scaling_multiplies_rate() {
        let t = standard();
        assert!((t.rate_per_km(RateScaling::ByCapacity) - 4.8).abs() < 1e-9);
        assert!((t.fare(10.0, RateScaling::ByCapacity) - 50.5).abs() < 1e-9);
    }

    #[test]
    fn parses_scaling_names() {
        assert_eq!("flat".parse::<RateScaling>().unwrap(), RateScaling::Flat);
        assert_eq!(
            " Capacity ".parse::<RateScaling>().unwrap(),
            RateScaling::ByCapacity
        );
        assert!("seats".parse::<RateScaling>().is_err());
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_currency(3.6549), 3.65);
        assert_eq!(round_currency(5.0), 5.0);
    }
}
