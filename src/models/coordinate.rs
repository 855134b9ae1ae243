//! WGS-84 coordinate model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MeetingError;

/// A latitude/longitude pair in WGS-84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees, within [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, within [-180, 180]
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the WGS-84 range
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MeetingError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(MeetingError::invalid_input(format!(
                "Latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(MeetingError::invalid_input(format!(
                "Longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build a coordinate from raw degrees, clamping latitude and wrapping longitude
    #[must_use]
    pub fn normalized(latitude: f64, longitude: f64) -> Self {
        let latitude = latitude.clamp(-90.0, 90.0);
        let mut longitude = (longitude + 180.0).rem_euclid(360.0) - 180.0;
        if longitude == -180.0 {
            longitude = 180.0;
        }
        Self {
            latitude,
            longitude,
        }
    }

    /// Euclidean distance in flat degree space
    #[must_use]
    pub fn flat_distance(&self, other: &Coordinate) -> f64 {
        let d_lat = self.latitude - other.latitude;
        let d_lng = self.longitude - other.longitude;
        (d_lat * d_lat + d_lng * d_lng).sqrt()
    }

    /// Great-circle distance in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine::distance(
            haversine::Location {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            haversine::Location {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            haversine::Units::Kilometers,
        )
    }

    /// Format as the `lat,lng` parameter maps providers expect
    #[must_use]
    pub fn to_param(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = MeetingError;

    /// Parse a `lat,lng` string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| MeetingError::invalid_input(format!("Invalid coordinate format: {s}")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| MeetingError::invalid_input(format!("Invalid latitude in: {s}")))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| MeetingError::invalid_input(format!("Invalid longitude in: {s}")))?;
        Coordinate::new(lat, lng)
    }
}
