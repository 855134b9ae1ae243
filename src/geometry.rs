//! Geometry utilities for choosing where to look for venues
//!
//! Centroids are computed on the sphere. Midpoints and random search points
//! are generated in flat degree space, which is accurate enough at city scale.

use std::f64::consts::TAU;

use rand::RngExt;

use crate::models::Coordinate;
use crate::{MeetingError, Result};

/// Geographic centre of a set of coordinates, averaged as unit vectors on the sphere
pub fn spherical_centroid(coords: &[Coordinate]) -> Result<Coordinate> {
    if coords.is_empty() {
        return Err(MeetingError::invalid_input("Coordinate list is empty"));
    }

    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for coord in coords {
        let lat = coord.latitude.to_radians();
        let lng = coord.longitude.to_radians();
        x += lat.cos() * lng.cos();
        y += lat.cos() * lng.sin();
        z += lat.sin();
    }

    let n = coords.len() as f64;
    let (x, y, z) = (x / n, y / n, z / n);

    let hyp = (x * x + y * y).sqrt();
    let latitude = z.atan2(hyp).to_degrees();
    let longitude = y.atan2(x).to_degrees();

    Ok(Coordinate::normalized(latitude, longitude))
}

/// `n` evenly spaced points strictly between `a` and `b`, at fractions `i/(n+1)`
#[must_use]
pub fn linear_midpoints(a: Coordinate, b: Coordinate, n: usize) -> Vec<Coordinate> {
    interpolate(a, b, n, 0.0, 1.0)
}

/// `n` evenly spaced points covering the middle half of the segment from `a` to `b`
#[must_use]
pub fn quartile_midpoints(a: Coordinate, b: Coordinate, n: usize) -> Vec<Coordinate> {
    interpolate(a, b, n, 0.25, 0.75)
}

fn interpolate(a: Coordinate, b: Coordinate, n: usize, start: f64, end: f64) -> Vec<Coordinate> {
    let d_lat = b.latitude - a.latitude;
    let d_lng = b.longitude - a.longitude;

    (1..=n)
        .map(|i| {
            let ratio = start + (end - start) * (i as f64 / (n + 1) as f64);
            Coordinate::normalized(a.latitude + ratio * d_lat, a.longitude + ratio * d_lng)
        })
        .collect()
}

/// `n` random points within `radius` degrees of `center`
///
/// Angle is uniform in [0, 2π) and distance uniform in [0, radius], so points
/// cluster towards the centre. Pass a seeded generator for reproducible output.
pub fn radial_points<R: RngExt + ?Sized>(
    center: Coordinate,
    radius: f64,
    n: usize,
    rng: &mut R,
) -> Vec<Coordinate> {
    let radius = radius.max(0.0);
    (0..n)
        .map(|_| {
            let angle: f64 = rng.random_range(0.0..TAU);
            let distance: f64 = rng.random_range(0.0..=radius);
            Coordinate::normalized(
                center.latitude + distance * angle.cos(),
                center.longitude + distance * angle.sin(),
            )
        })
        .collect()
}

/// How far a group of participants is spread around its centroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    /// Largest flat-degree distance from the centroid to any participant
    pub max_degrees: f64,
    /// Largest great-circle distance from the centroid to any participant
    pub max_km: f64,
}

impl Spread {
    #[must_use]
    pub fn around(centroid: Coordinate, coords: &[Coordinate]) -> Self {
        coords.iter().fold(
            Spread {
                max_degrees: 0.0,
                max_km: 0.0,
            },
            |acc, coord| Spread {
                max_degrees: acc.max_degrees.max(centroid.flat_distance(coord)),
                max_km: acc.max_km.max(centroid.distance_km(coord)),
            },
        )
    }
}

/// The centroid followed by `count - 1` random points within `radius` of it
pub fn search_points<R: RngExt + ?Sized>(
    centroid: Coordinate,
    radius: f64,
    count: usize,
    rng: &mut R,
) -> Vec<Coordinate> {
    let mut points = vec![centroid];
    points.extend(radial_points(centroid, radius, count.saturating_sub(1), rng));
    points
}
