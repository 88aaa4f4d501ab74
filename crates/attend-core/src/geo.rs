//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
  pub lat: f64,
  pub lng: f64,
}

impl GeoCoordinate {
  /// Build a coordinate, validating the degree ranges.
  pub fn new(lat: f64, lng: f64) -> Result<Self> {
    if !(-90.0..=90.0).contains(&lat) {
      return Err(Error::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lng) {
      return Err(Error::LongitudeOutOfRange(lng));
    }
    Ok(Self { lat, lng })
  }
}

/// Haversine great-circle distance between `a` and `b`, in meters.
///
/// Symmetric, zero for identical points, never negative, and total for any
/// pair of valid coordinates (poles and antipodes included).
pub fn distance_meters(a: GeoCoordinate, b: GeoCoordinate) -> f64 {
  let phi1 = a.lat.to_radians();
  let phi2 = b.lat.to_radians();
  let d_phi = (b.lat - a.lat).to_radians();
  let d_lambda = (b.lng - a.lng).to_radians();

  let h = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

  // Rounding can push h a hair past 1.0 near antipodal pairs; clamp so the
  // square roots stay real.
  let h = h.clamp(0.0, 1.0);
  let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

  EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
  use super::*;

  fn coord(lat: f64, lng: f64) -> GeoCoordinate {
    GeoCoordinate::new(lat, lng).unwrap()
  }

  #[test]
  fn identical_points_are_zero_meters_apart() {
    let hospital = coord(37.4219983, -122.084);
    assert_eq!(distance_meters(hospital, hospital), 0.0);
  }

  #[test]
  fn distance_is_symmetric() {
    let a = coord(37.4219983, -122.084);
    let b = coord(37.43, -122.09);
    assert_eq!(distance_meters(a, b), distance_meters(b, a));
  }

  #[test]
  fn distance_is_never_negative() {
    let pairs = [
      (coord(0.0, 0.0), coord(0.0, 0.0)),
      (coord(90.0, 0.0), coord(-90.0, 0.0)),
      (coord(51.5, -0.1), coord(-33.9, 151.2)),
      (coord(0.0, -180.0), coord(0.0, 180.0)),
    ];
    for (a, b) in pairs {
      assert!(distance_meters(a, b) >= 0.0);
    }
  }

  #[test]
  fn pole_to_pole_is_half_the_circumference() {
    let d = distance_meters(coord(90.0, 0.0), coord(-90.0, 0.0));
    let half_circumference = std::f64::consts::PI * 6_371_000.0;
    assert!((d - half_circumference).abs() < 1.0, "got {d}");
  }

  #[test]
  fn antipodal_meridian_wrap_is_finite_and_zero() {
    // -180 and 180 are the same meridian.
    let d = distance_meters(coord(0.0, -180.0), coord(0.0, 180.0));
    assert!(d.is_finite());
    assert!(d < 1.0e-6, "got {d}");
  }

  #[test]
  fn one_degree_of_latitude_is_about_111_km() {
    let d = distance_meters(coord(0.0, 0.0), coord(1.0, 0.0));
    assert!((d - 111_195.0).abs() < 100.0, "got {d}");
  }

  #[test]
  fn rejects_out_of_range_degrees() {
    assert!(GeoCoordinate::new(90.1, 0.0).is_err());
    assert!(GeoCoordinate::new(-90.1, 0.0).is_err());
    assert!(GeoCoordinate::new(0.0, 180.1).is_err());
    assert!(GeoCoordinate::new(0.0, -180.1).is_err());
    assert!(GeoCoordinate::new(f64::NAN, 0.0).is_err());
  }
}
