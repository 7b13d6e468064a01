//! crates/trip_planner_core/src/route.rs
//!
//! Straight-line route estimates used before, or without, a directions lookup.

use crate::domain::{Coordinate, TransportMode};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Check-in, security and transfers on both ends of a flight.
const AIRPORT_OVERHEAD_HOURS: f64 = 2.0;

impl TransportMode {
    /// Average cruising speed used for travel time estimates.
    pub fn average_speed_kmh(self) -> f64 {
        match self {
            TransportMode::Car => 60.0,
            TransportMode::Moto => 70.0,
            TransportMode::Motorhome => 50.0,
            TransportMode::Airplane => 750.0,
        }
    }
}

/// Great-circle distance between two points (haversine).
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub hours: f64,
}

/// Estimates the trip length and duration for `mode` from the straight-line
/// distance. Flights add a fixed airport overhead.
pub fn estimate_travel(
    origin: Coordinate,
    destination: Coordinate,
    mode: TransportMode,
) -> TravelEstimate {
    let distance_km = distance_km(origin, destination);
    let mut hours = distance_km / mode.average_speed_kmh();
    if mode == TransportMode::Airplane {
        hours += AIRPORT_OVERHEAD_HOURS;
    }
    TravelEstimate { distance_km, hours }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sao_paulo() -> Coordinate {
        Coordinate::new(-23.5505, -46.6333)
    }

    fn rio() -> Coordinate {
        Coordinate::new(-22.9068, -43.1729)
    }

    #[test]
    fn sao_paulo_to_rio_is_about_360_km() {
        let d = distance_km(sao_paulo(), rio());
        assert!((d - 360.75).abs() < 0.05, "got {}", d);
        assert!((d - distance_km(rio(), sao_paulo())).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_longitude_on_the_equator() {
        let d = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
        assert_eq!(distance_km(rio(), rio()), 0.0);
    }

    #[test]
    fn car_takes_five_to_seven_hours_to_rio() {
        let estimate = estimate_travel(sao_paulo(), rio(), TransportMode::Car);
        assert!(estimate.hours > 5.0 && estimate.hours < 7.0, "got {}", estimate.hours);
    }

    #[test]
    fn flights_include_airport_time() {
        let flight = estimate_travel(sao_paulo(), rio(), TransportMode::Airplane);
        let moto = estimate_travel(sao_paulo(), rio(), TransportMode::Moto);
        assert!(flight.hours > AIRPORT_OVERHEAD_HOURS);
        assert!(flight.hours < moto.hours);
        assert_eq!(flight.distance_km, moto.distance_km);
    }

    #[test]
    fn unsupported_modes_are_rejected() {
        let err = "invalid".parse::<TransportMode>().unwrap_err();
        assert!(err.contains("unsupported transport mode"));
        assert_eq!("Motorhome".parse::<TransportMode>(), Ok(TransportMode::Motorhome));
    }
}
