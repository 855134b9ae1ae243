//! Fake maps providers and helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use fairmeet::config::SearchConfig;
use fairmeet::geocoding::GeocodingProvider;
use fairmeet::places::{AutocompleteProvider, PlaceResult, PlacesProvider, Suggestion};
use fairmeet::travel_time::{MatrixCell, TravelTimeProvider};
use fairmeet::{Coordinate, GeocodeCache, MeetingPlanner, ProviderError, TransportMode};

pub fn c(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).expect("test coordinate should be valid")
}

/// Resolves a fixed set of addresses; `denied` addresses fail as a rejected API key
#[derive(Default)]
pub struct FakeGeocoder {
    pub known: HashMap<String, Coordinate>,
    pub denied: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn new(known: &[(&str, Coordinate)]) -> Self {
        Self {
            known: known.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Default::default()
        }
    }

    pub fn denying(mut self, address: &str) -> Self {
        self.denied.insert(address.to_string());
        self
    }
}

#[async_trait]
impl GeocodingProvider for FakeGeocoder {
    async fn geocode(&self, text: &str) -> Result<Option<Coordinate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.denied.contains(text) {
            return Err(ProviderError::Authentication(
                "REQUEST_DENIED: The provided API key is invalid.".into(),
            ));
        }
        Ok(self.known.get(text).copied())
    }
}

/// Returns the same venues around every search point, or fails every query
#[derive(Default)]
pub struct FakePlaces {
    pub places: Vec<PlaceResult>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakePlaces {
    pub fn with_venues(venues: &[(&str, Option<f64>, Coordinate)]) -> Self {
        Self {
            places: venues
                .iter()
                .map(|&(name, rating, coordinate)| PlaceResult {
                    id: format!("id_{name}"),
                    name: name.to_string(),
                    address: format!("{name} Street"),
                    rating,
                    rating_count: 10,
                    photo_ref: Some(format!("photo_{name}")),
                    coordinate,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PlacesProvider for FakePlaces {
    async fn nearby(
        &self,
        _center: Coordinate,
        _radius_m: f64,
        _place_type: &str,
    ) -> Result<Vec<PlaceResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(self.places.clone())
    }

    fn photo_url(&self, photo_ref: &str, max_width: u32, max_height: u32) -> String {
        format!("https://photos.test/{photo_ref}?w={max_width}&h={max_height}")
    }

    fn embed_url(&self, place_name: &str) -> String {
        format!("https://maps.test/embed?q={}", place_name.replace(' ', "+"))
    }
}

/// Travel time is 100 seconds per degree of flat distance
#[derive(Default)]
pub struct FakeMatrix {
    /// (origin, destination) pairs reported as NOT_FOUND
    pub unreachable: Vec<(Coordinate, Coordinate)>,
    pub failing_modes: HashSet<TransportMode>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TravelTimeProvider for FakeMatrix {
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TransportMode,
    ) -> Result<Vec<Vec<MatrixCell>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_modes.contains(&mode) {
            return Err(ProviderError::RateLimited("OVER_QUERY_LIMIT".into()));
        }
        Ok(origins
            .iter()
            .map(|origin| {
                destinations
                    .iter()
                    .map(|destination| {
                        if self.unreachable.contains(&(*origin, *destination)) {
                            MatrixCell::not_found()
                        } else {
                            MatrixCell::ok((origin.flat_distance(destination) * 100.0).round() as u64)
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

pub struct FakeSuggester;

#[async_trait]
impl AutocompleteProvider for FakeSuggester {
    async fn suggest(&self, partial_text: &str) -> Vec<Suggestion> {
        if partial_text.is_empty() {
            return Vec::new();
        }
        vec![Suggestion {
            description: format!("{partial_text} St, Sydney NSW, Australia"),
            place_id: "suggestion_1".to_string(),
        }]
    }
}

pub fn seeded_settings() -> SearchConfig {
    SearchConfig {
        seed: Some(7),
        ..Default::default()
    }
}

pub fn planner(
    geocoder: Arc<FakeGeocoder>,
    places: Arc<FakePlaces>,
    matrix: Arc<FakeMatrix>,
) -> MeetingPlanner {
    MeetingPlanner::from_providers(
        geocoder,
        places,
        matrix,
        Arc::new(GeocodeCache::in_memory(Duration::from_secs(3600), 100)),
        seeded_settings(),
    )
}

/// Two people at (0,0) and (0,2), one venue halfway and one close to A
pub fn two_person_world() -> (Arc<FakeGeocoder>, Arc<FakePlaces>, Arc<FakeMatrix>) {
    let geocoder = Arc::new(FakeGeocoder::new(&[
        ("A home", c(0.0, 0.0)),
        ("B home", c(0.0, 2.0)),
    ]));
    let places = Arc::new(FakePlaces::with_venues(&[
        ("Halfway Cafe", Some(4.0), c(0.0, 1.0)),
        ("Corner Cafe", Some(4.8), c(0.0, 0.5)),
    ]));
    (geocoder, places, Arc::new(FakeMatrix::default()))
}

/// Send a request and return `(status, body as JSON)`.
pub async fn send_json(
    app: axum::Router,
    method: &str,
    uri: &str,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(payload.to_string())),
        None => builder.body(axum::body::Body::empty()),
    }
    .expect("request build should succeed");

    let resp = app.oneshot(request).await.expect("app should handle request");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}
