//! Google Maps Platform client
//!
//! One HTTP client, shared by the geocoding, places, distance-matrix and
//! autocomplete endpoints. Transient HTTP failures are retried by
//! `reqwest-retry`; Google's own `status` field is mapped onto `ProviderError`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::MeetingError;
use crate::config::GoogleConfig;
use crate::error::ProviderError;
use crate::geocoding::GeocodingProvider;
use crate::models::{Coordinate, TransportMode};
use crate::places::{AutocompleteProvider, PlaceResult, PlacesProvider, Suggestion};
use crate::travel_time::{MatrixCell, TravelTimeProvider};

/// Autocomplete suggestions returned to the caller
const MAX_SUGGESTIONS: usize = 5;

pub struct GoogleMapsClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    embed_base_url: String,
    region: String,
}

impl GoogleMapsClient {
    pub fn new(config: &GoogleConfig) -> crate::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            MeetingError::config("No Google API key configured. Set google.api_key or GOOG_API_KEY.")
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .user_agent(concat!("fairmeet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MeetingError::config(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embed_base_url: config.embed_base_url.trim_end_matches('/').to_string(),
            region: config.region.clone(),
        })
    }

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect();
        query.push(format!("key={}", urlencoding::encode(&self.api_key)));
        format!("{}/{}?{}", self.base_url, endpoint, query.join("&"))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = self.endpoint_url(endpoint, params);
        debug!("Calling Google endpoint {}", endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("{endpoint} request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Authentication(format!(
                    "Google rejected the API key ({status})"
                )),
                429 => ProviderError::RateLimited(format!("Google rate limit exceeded on {endpoint}")),
                _ => ProviderError::Api(format!("Google API error {status}: {error_text}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse {endpoint} response: {e}")))
    }
}

/// Map Google's response-level `status` onto a provider error
fn check_status(status: &str, error_message: Option<&str>) -> Result<(), ProviderError> {
    let detail = || match error_message {
        Some(message) => format!("{status}: {message}"),
        None => status.to_string(),
    };
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(ProviderError::RateLimited(detail())),
        "REQUEST_DENIED" => Err(ProviderError::Authentication(detail())),
        _ => Err(ProviderError::Api(detail())),
    }
}

#[async_trait]
impl GeocodingProvider for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn geocode(&self, text: &str) -> Result<Option<Coordinate>, ProviderError> {
        let response: wire::GeocodeResponse = self.get_json("geocode/json", &[("address", text)]).await?;
        response.into_coordinate()
    }
}

#[async_trait]
impl PlacesProvider for GoogleMapsClient {
    #[instrument(skip(self, center), fields(center = %center))]
    async fn nearby(
        &self,
        center: Coordinate,
        radius_m: f64,
        place_type: &str,
    ) -> Result<Vec<PlaceResult>, ProviderError> {
        let location = center.to_param();
        let radius = format!("{}", radius_m.round());
        let response: wire::NearbyResponse = self
            .get_json(
                "place/nearbysearch/json",
                &[("location", location.as_str()), ("radius", radius.as_str()), ("type", place_type)],
            )
            .await?;
        response.into_places()
    }

    fn photo_url(&self, photo_ref: &str, max_width: u32, max_height: u32) -> String {
        self.endpoint_url(
            "place/photo",
            &[
                ("maxwidth", max_width.to_string().as_str()),
                ("maxheight", max_height.to_string().as_str()),
                ("photoreference", photo_ref),
            ],
        )
    }

    fn embed_url(&self, place_name: &str) -> String {
        let query = urlencoding::encode(place_name).replace("%20", "+");
        format!(
            "{}/place?q={}&key={}",
            self.embed_base_url,
            query,
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl TravelTimeProvider for GoogleMapsClient {
    #[instrument(skip(self, origins, destinations), fields(origins = origins.len(), destinations = destinations.len()))]
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TransportMode,
    ) -> Result<Vec<Vec<MatrixCell>>, ProviderError> {
        let origins = join_points(origins);
        let destinations = join_points(destinations);
        let response: wire::MatrixResponse = self
            .get_json(
                "distancematrix/json",
                &[
                    ("origins", origins.as_str()),
                    ("destinations", destinations.as_str()),
                    ("mode", mode.as_str()),
                ],
            )
            .await?;
        response.into_cells()
    }
}

#[async_trait]
impl AutocompleteProvider for GoogleMapsClient {
    async fn suggest(&self, partial_text: &str) -> Vec<Suggestion> {
        if partial_text.trim().is_empty() {
            return Vec::new();
        }

        let components = format!("country:{}", self.region);
        let result: Result<wire::AutocompleteResponse, _> = self
            .get_json(
                "place/autocomplete/json",
                &[
                    ("input", partial_text),
                    ("components", components.as_str()),
                    ("types", "address"),
                ],
            )
            .await;

        match result.and_then(wire::AutocompleteResponse::into_suggestions) {
            Ok(mut suggestions) => {
                suggestions.truncate(MAX_SUGGESTIONS);
                suggestions
            }
            Err(e) => {
                warn!("Autocomplete for '{}' failed: {}", partial_text, e);
                Vec::new()
            }
        }
    }
}

fn join_points(points: &[Coordinate]) -> String {
    points
        .iter()
        .map(Coordinate::to_param)
        .collect::<Vec<_>>()
        .join("|")
}

/// Response shapes of the Google Maps web services
mod wire {
    use serde::Deserialize;

    use super::check_status;
    use crate::error::ProviderError;
    use crate::models::Coordinate;
    use crate::places::{PlaceResult, Suggestion};
    use crate::travel_time::MatrixCell;

    #[derive(Debug, Deserialize)]
    pub struct LatLng {
        pub lat: f64,
        pub lng: f64,
    }

    impl LatLng {
        fn to_coordinate(&self) -> Result<Coordinate, ProviderError> {
            Coordinate::new(self.lat, self.lng)
                .map_err(|e| ProviderError::Parse(format!("Invalid coordinate in response: {e}")))
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct Geometry {
        pub location: LatLng,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodeResponse {
        pub status: String,
        pub error_message: Option<String>,
        #[serde(default)]
        pub results: Vec<GeocodeResult>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodeResult {
        pub geometry: Geometry,
    }

    impl GeocodeResponse {
        pub fn into_coordinate(self) -> Result<Option<Coordinate>, ProviderError> {
            check_status(&self.status, self.error_message.as_deref())?;
            self.results
                .first()
                .map(|r| r.geometry.location.to_coordinate())
                .transpose()
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct NearbyResponse {
        pub status: String,
        pub error_message: Option<String>,
        #[serde(default)]
        pub results: Vec<NearbyPlace>,
    }

    #[derive(Debug, Deserialize)]
    pub struct NearbyPlace {
        pub place_id: String,
        pub name: String,
        #[serde(default)]
        pub vicinity: String,
        pub rating: Option<f64>,
        #[serde(default)]
        pub user_ratings_total: u32,
        #[serde(default)]
        pub photos: Vec<Photo>,
        pub geometry: Geometry,
    }

    #[derive(Debug, Deserialize)]
    pub struct Photo {
        pub photo_reference: String,
    }

    impl NearbyResponse {
        pub fn into_places(self) -> Result<Vec<PlaceResult>, ProviderError> {
            check_status(&self.status, self.error_message.as_deref())?;
            self.results
                .into_iter()
                .map(|place| {
                    Ok(PlaceResult {
                        coordinate: place.geometry.location.to_coordinate()?,
                        id: place.place_id,
                        name: place.name,
                        address: place.vicinity,
                        rating: place.rating,
                        rating_count: place.user_ratings_total,
                        photo_ref: place.photos.into_iter().next().map(|p| p.photo_reference),
                    })
                })
                .collect()
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct MatrixResponse {
        pub status: String,
        pub error_message: Option<String>,
        #[serde(default)]
        pub rows: Vec<MatrixRow>,
    }

    #[derive(Debug, Deserialize)]
    pub struct MatrixRow {
        pub elements: Vec<MatrixElement>,
    }

    #[derive(Debug, Deserialize)]
    pub struct MatrixElement {
        pub status: String,
        pub duration: Option<Duration>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Duration {
        pub value: u64,
    }

    impl MatrixResponse {
        pub fn into_cells(self) -> Result<Vec<Vec<MatrixCell>>, ProviderError> {
            check_status(&self.status, self.error_message.as_deref())?;
            Ok(self
                .rows
                .into_iter()
                .map(|row| {
                    row.elements
                        .into_iter()
                        .map(|element| match (element.status.as_str(), element.duration) {
                            ("OK", Some(duration)) => MatrixCell::ok(duration.value),
                            _ => MatrixCell::not_found(),
                        })
                        .collect()
                })
                .collect())
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct AutocompleteResponse {
        pub status: String,
        pub error_message: Option<String>,
        #[serde(default)]
        pub predictions: Vec<Prediction>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Prediction {
        pub description: String,
        pub place_id: String,
    }

    impl AutocompleteResponse {
        pub fn into_suggestions(self) -> Result<Vec<Suggestion>, ProviderError> {
            check_status(&self.status, self.error_message.as_deref())?;
            Ok(self
                .predictions
                .into_iter()
                .map(|p| Suggestion {
                    description: p.description,
                    place_id: p.place_id,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travel_time::CellStatus;
    use rstest::rstest;

    fn client() -> GoogleMapsClient {
        let config = GoogleConfig {
            api_key: Some("test_key_123".to_string()),
            ..Default::default()
        };
        GoogleMapsClient::new(&config).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = GoogleMapsClient::new(&GoogleConfig::default()).err().unwrap();
        assert_eq!(err.stage(), "config");
    }

    #[test]
    fn test_endpoint_url_encodes_params() {
        let url = client().endpoint_url("geocode/json", &[("address", "1 Main St, Sydney")]);
        assert_eq!(
            url,
            "https://maps.googleapis.com/maps/api/geocode/json?address=1%20Main%20St%2C%20Sydney&key=test_key_123"
        );
    }

    #[test]
    fn test_photo_url() {
        let url = client().photo_url("abc123", 300, 200);
        assert_eq!(
            url,
            "https://maps.googleapis.com/maps/api/place/photo?maxwidth=300&maxheight=200&photoreference=abc123&key=test_key_123"
        );
    }

    #[test]
    fn test_embed_url_uses_plus_for_spaces() {
        let url = client().embed_url("Cafe Sydney & Bar");
        assert_eq!(
            url,
            "https://www.google.com/maps/embed/v1/place?q=Cafe+Sydney+%26+Bar&key=test_key_123"
        );
    }

    #[test]
    fn test_join_points() {
        let points = [Coordinate::new(-33.8, 151.2).unwrap(), Coordinate::new(-33.9, 151.0).unwrap()];
        assert_eq!(join_points(&points), "-33.8,151.2|-33.9,151");
    }

    #[rstest]
    #[case("OK", None)]
    #[case("ZERO_RESULTS", None)]
    #[case("OVER_QUERY_LIMIT", Some(ProviderError::RateLimited("OVER_QUERY_LIMIT".into())))]
    #[case("REQUEST_DENIED", Some(ProviderError::Authentication("REQUEST_DENIED".into())))]
    #[case("INVALID_REQUEST", Some(ProviderError::Api("INVALID_REQUEST".into())))]
    fn test_check_status(#[case] status: &str, #[case] expected: Option<ProviderError>) {
        assert_eq!(check_status(status, None).err(), expected);
    }

    #[test]
    fn test_geocode_response() {
        let json = r#"{
            "status": "OK",
            "results": [
                {"geometry": {"location": {"lat": -33.8688, "lng": 151.2093}}, "formatted_address": "Sydney NSW"},
                {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
            ]
        }"#;
        let response: wire::GeocodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.into_coordinate().unwrap(),
            Some(Coordinate::new(-33.8688, 151.2093).unwrap())
        );

        let empty: wire::GeocodeResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert_eq!(empty.into_coordinate().unwrap(), None);
    }

    #[test]
    fn test_denied_geocode_carries_message() {
        let json = r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#;
        let response: wire::GeocodeResponse = serde_json::from_str(json).unwrap();
        let err = response.into_coordinate().unwrap_err();
        assert_eq!(
            err,
            ProviderError::Authentication("REQUEST_DENIED: The provided API key is invalid.".into())
        );
    }

    #[test]
    fn test_nearby_response() {
        let json = r#"{
            "status": "OK",
            "results": [
                {
                    "place_id": "p1",
                    "name": "Harbour Cafe",
                    "vicinity": "1 Circular Quay",
                    "rating": 4.4,
                    "user_ratings_total": 812,
                    "photos": [{"photo_reference": "ref1", "height": 100, "width": 100}],
                    "geometry": {"location": {"lat": -33.861, "lng": 151.21}}
                },
                {
                    "place_id": "p2",
                    "name": "New Place",
                    "geometry": {"location": {"lat": -33.87, "lng": 151.2}}
                }
            ]
        }"#;
        let response: wire::NearbyResponse = serde_json::from_str(json).unwrap();
        let places = response.into_places().unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].id, "p1");
        assert_eq!(places[0].rating, Some(4.4));
        assert_eq!(places[0].rating_count, 812);
        assert_eq!(places[0].photo_ref.as_deref(), Some("ref1"));
        assert_eq!(places[1].rating, None);
        assert_eq!(places[1].rating_count, 0);
        assert!(places[1].photo_ref.is_none());
    }

    #[test]
    fn test_matrix_response() {
        let json = r#"{
            "status": "OK",
            "rows": [
                {"elements": [
                    {"status": "OK", "duration": {"value": 840, "text": "14 mins"}},
                    {"status": "ZERO_RESULTS"}
                ]},
                {"elements": [
                    {"status": "NOT_FOUND"},
                    {"status": "OK", "duration": {"value": 1260, "text": "21 mins"}}
                ]}
            ]
        }"#;
        let response: wire::MatrixResponse = serde_json::from_str(json).unwrap();
        let cells = response.into_cells().unwrap();

        assert_eq!(cells[0][0], MatrixCell::ok(840));
        assert_eq!(cells[0][1].status, CellStatus::NotFound);
        assert_eq!(cells[1][0].seconds(), None);
        assert_eq!(cells[1][1].seconds(), Some(1260));
    }

    #[test]
    fn test_over_limit_matrix_is_rate_limited() {
        let response: wire::MatrixResponse =
            serde_json::from_str(r#"{"status": "OVER_QUERY_LIMIT", "rows": []}"#).unwrap();
        assert!(matches!(response.into_cells(), Err(ProviderError::RateLimited(_))));
    }

    #[test]
    fn test_autocomplete_response() {
        let json = r#"{
            "status": "OK",
            "predictions": [
                {"description": "1 George St, Sydney NSW, Australia", "place_id": "a"},
                {"description": "1 George St, Parramatta NSW, Australia", "place_id": "b"}
            ]
        }"#;
        let response: wire::AutocompleteResponse = serde_json::from_str(json).unwrap();
        let suggestions = response.into_suggestions().unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[1].place_id, "b");
    }
}
