//! Meeting-point orchestration
//!
//! `MeetingPlanner` runs one search end to end:
//! geocode → centroid and search points → venue discovery → travel times →
//! completeness filter → fairness scoring → ranking. Soft provider failures
//! are reported as warnings on the returned `MeetingPlan`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::GeocodeCache;
use crate::config::SearchConfig;
use crate::fairness::{self, RankingStrategy};
use crate::geocoding::{Geocoder, GeocodingProvider};
use crate::geometry::{self, Spread};
use crate::models::{Coordinate, Participant, ResolvedParticipant, ScoredVenue, Venue};
use crate::places::{PlacesProvider, VenueDiscovery};
use crate::travel_time::{TravelTimeEstimator, TravelTimeProvider};
use crate::{MeetingError, Result};

/// One meeting-place query as received from the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub participants: Vec<Participant>,
    pub place_type: String,
    /// Ranking strategy name, the configured default when absent
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Result of a search: ranked venues plus everything needed to explain them
#[derive(Debug, Clone, Serialize)]
pub struct MeetingPlan {
    pub participants: Vec<ResolvedParticipant>,
    pub centroid: Coordinate,
    pub search_points: Vec<Coordinate>,
    pub strategy: RankingStrategy,
    pub venues: Vec<ScoredVenue>,
    /// Soft failures that reduced coverage or accuracy
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl fmt::Display for MeetingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📍 Meeting point analysis ({} strategy)", self.strategy)?;
        for participant in &self.participants {
            writeln!(
                f,
                "  👤 {} from ({}) by {}",
                participant.name(),
                participant.location,
                participant.mode()
            )?;
        }
        writeln!(f, "  🎯 Centre: ({})", self.centroid)?;
        writeln!(f)?;

        if self.venues.is_empty() {
            writeln!(f, "No venues every participant can reach were found.")?;
        }
        for (rank, venue) in self.venues.iter().enumerate() {
            writeln!(f, "{}. {}", rank + 1, venue)?;
        }

        for warning in &self.warnings {
            writeln!(f, "⚠️  {warning}")?;
        }
        Ok(())
    }
}

pub struct MeetingPlanner {
    geocoder: Geocoder,
    discovery: VenueDiscovery,
    estimator: TravelTimeEstimator,
    settings: SearchConfig,
}

impl MeetingPlanner {
    pub fn new(
        geocoder: Geocoder,
        discovery: VenueDiscovery,
        estimator: TravelTimeEstimator,
        settings: SearchConfig,
    ) -> Self {
        Self {
            geocoder,
            discovery,
            estimator,
            settings,
        }
    }

    /// Wire a planner from raw providers, applying the search settings to each stage
    pub fn from_providers(
        geocoding: Arc<dyn GeocodingProvider>,
        places: Arc<dyn PlacesProvider>,
        travel_times: Arc<dyn TravelTimeProvider>,
        cache: Arc<GeocodeCache>,
        settings: SearchConfig,
    ) -> Self {
        let timeout = settings.call_timeout();
        Self::new(
            Geocoder::new(geocoding, cache, timeout),
            VenueDiscovery::new(places, settings.radius_policy(), timeout),
            TravelTimeEstimator::new(travel_times, timeout, settings.matrix_max_destinations),
            settings,
        )
    }

    #[must_use]
    pub fn settings(&self) -> &SearchConfig {
        &self.settings
    }

    /// Ranked venues for `participants`, at most `max_results` of them
    pub async fn find_meeting_places(
        &self,
        participants: Vec<Participant>,
        place_type: &str,
        strategy: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredVenue>> {
        let request = SearchRequest {
            participants,
            place_type: place_type.to_string(),
            strategy: Some(strategy.to_string()),
            max_results: Some(max_results),
        };
        Ok(self.plan(&request).await?.venues)
    }

    /// Run a search, drawing random search points from the configured seed or entropy
    pub async fn plan(&self, request: &SearchRequest) -> Result<MeetingPlan> {
        let seed = self
            .settings
            .seed
            .unwrap_or_else(|| rand::rng().random::<u64>());
        let mut rng = StdRng::seed_from_u64(seed);
        self.plan_with_rng(request, &mut rng).await
    }

    /// Run a search with an injected random source
    #[instrument(skip_all, fields(participants = request.participants.len(), place_type = %request.place_type))]
    pub async fn plan_with_rng<R: RngExt + Send + ?Sized>(
        &self,
        request: &SearchRequest,
        rng: &mut R,
    ) -> Result<MeetingPlan> {
        let (strategy, max_results) = self.validate(request)?;
        let mut warnings = Vec::new();

        let participants = self.geocoder.resolve_participants(&request.participants).await?;
        let locations: Vec<Coordinate> = participants.iter().map(|p| p.location).collect();

        let centroid = geometry::spherical_centroid(&locations)?;
        let spread = Spread::around(centroid, &locations);
        let radius = spread.max_degrees * self.settings.radius_ratio;
        info!(
            "Participants spread up to {:.1} km around ({}), scattering search points within {:.4}°",
            spread.max_km, centroid, radius
        );

        let mut search_points =
            geometry::search_points(centroid, radius, self.settings.search_points, rng);
        search_points.dedup();

        if let [a, b] = participants.as_slice() {
            match self.balanced_point(a, b).await {
                Ok(Some(point)) if !search_points.contains(&point) => search_points.insert(1, point),
                Ok(_) => {}
                Err(e) => {
                    warn!("Balanced midpoint lookup failed: {}", e);
                    warnings.push(format!("Could not compare travel times between {} and {}: {e}", a.name(), b.name()));
                }
            }
        }

        let venues = self
            .discover(&search_points, &request.place_type, &mut warnings)
            .await;

        let report = self.estimator.annotate_travel_times(&participants, venues).await;
        for (mode, e) in &report.failures {
            warnings.push(format!("Travel times by {mode} unavailable: {e}"));
        }

        let discovered = report.venues.len();
        let complete: Vec<_> = report
            .venues
            .into_iter()
            .filter(|v| v.is_complete(participants.len()))
            .collect();
        if complete.len() < discovered {
            let dropped = discovered - complete.len();
            info!("Dropped {} venues without a route for every participant", dropped);
            warnings.push(format!(
                "{dropped} of {discovered} venues were unreachable for at least one participant"
            ));
        }

        let scored: Vec<ScoredVenue> = complete.into_iter().map(fairness::score).collect();
        let mut pool = fairness::rank(scored, RankingStrategy::Fairness);
        pool.truncate(self.settings.candidate_pool);

        let mut venues = fairness::rank(pool, strategy);
        venues.truncate(max_results);
        info!("Returning {} venues ranked by {}", venues.len(), strategy);

        Ok(MeetingPlan {
            participants,
            centroid,
            search_points,
            strategy,
            venues,
            warnings,
            generated_at: Utc::now(),
        })
    }

    fn validate(&self, request: &SearchRequest) -> Result<(RankingStrategy, usize)> {
        if request.participants.len() < 2 {
            return Err(MeetingError::invalid_input(
                "Need at least 2 people to find a meeting point",
            ));
        }

        let strategy = match &request.strategy {
            Some(name) => name.parse()?,
            None => self.settings.default_strategy,
        };

        let max_results = request.max_results.unwrap_or(self.settings.max_results);
        if max_results == 0 {
            return Err(MeetingError::invalid_input("max_results must be at least 1"));
        }

        if request.place_type.trim().is_empty() {
            return Err(MeetingError::invalid_input("A place type is required"));
        }

        let mut names = HashSet::new();
        for participant in &request.participants {
            if participant.name.trim().is_empty() {
                return Err(MeetingError::invalid_input("Every participant needs a name"));
            }
            if !names.insert(participant.name.as_str()) {
                return Err(MeetingError::invalid_input(format!(
                    "Participant name '{}' is used more than once",
                    participant.name
                )));
            }
            if participant.raw_location.trim().is_empty() {
                return Err(MeetingError::invalid_input(format!(
                    "No location given for {}",
                    participant.name
                )));
            }
        }

        Ok((strategy, max_results))
    }

    /// For two participants, the point in the middle half of their segment with the most even travel times
    async fn balanced_point(
        &self,
        a: &ResolvedParticipant,
        b: &ResolvedParticipant,
    ) -> std::result::Result<Option<Coordinate>, crate::error::ProviderError> {
        if self.settings.balanced_midpoints == 0 {
            return Ok(None);
        }
        let candidates = geometry::quartile_midpoints(a.location, b.location, self.settings.balanced_midpoints);
        self.estimator.most_balanced_point(a, b, &candidates).await
    }

    /// Query every search point concurrently and merge the results in search-point order
    async fn discover(
        &self,
        points: &[Coordinate],
        place_type: &str,
        warnings: &mut Vec<String>,
    ) -> Vec<Venue> {
        let searches = points.iter().map(|&point| {
            self.discovery.try_find_nearby(
                point,
                place_type,
                self.settings.initial_radius_m,
                self.settings.per_point_results,
            )
        });
        let results = join_all(searches).await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for (point, result) in points.iter().zip(results) {
            match result {
                Ok(venues) => {
                    for venue in venues {
                        if seen.insert(venue.merge_key()) {
                            merged.push(venue);
                        }
                    }
                }
                Err(e) => {
                    warn!("Places search near ({}) failed: {}", point, e);
                    warnings.push(format!("Places search near ({point}) failed: {e}"));
                }
            }
        }

        info!("{} unique venues across {} search points", merged.len(), points.len());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::TransportMode;
    use crate::places::PlaceResult;
    use crate::travel_time::MatrixCell;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoGeocoder;

    #[async_trait]
    impl GeocodingProvider for NoGeocoder {
        async fn geocode(&self, _text: &str) -> std::result::Result<Option<Coordinate>, ProviderError> {
            Ok(None)
        }
    }

    struct NoPlaces;

    #[async_trait]
    impl PlacesProvider for NoPlaces {
        async fn nearby(
            &self,
            _center: Coordinate,
            _radius_m: f64,
            _place_type: &str,
        ) -> std::result::Result<Vec<PlaceResult>, ProviderError> {
            Ok(Vec::new())
        }

        fn photo_url(&self, photo_ref: &str, _max_width: u32, _max_height: u32) -> String {
            photo_ref.to_string()
        }

        fn embed_url(&self, place_name: &str) -> String {
            place_name.to_string()
        }
    }

    struct NoRoutes;

    #[async_trait]
    impl TravelTimeProvider for NoRoutes {
        async fn matrix(
            &self,
            origins: &[Coordinate],
            destinations: &[Coordinate],
            _mode: TransportMode,
        ) -> std::result::Result<Vec<Vec<MatrixCell>>, ProviderError> {
            Ok(vec![vec![MatrixCell::not_found(); destinations.len()]; origins.len()])
        }
    }

    fn planner() -> MeetingPlanner {
        MeetingPlanner::from_providers(
            Arc::new(NoGeocoder),
            Arc::new(NoPlaces),
            Arc::new(NoRoutes),
            Arc::new(GeocodeCache::in_memory(Duration::from_secs(60), 10)),
            SearchConfig::default(),
        )
    }

    fn request(people: &[(&str, &str)]) -> SearchRequest {
        SearchRequest {
            participants: people
                .iter()
                .map(|&(name, at)| Participant::new(name, at, TransportMode::Driving))
                .collect(),
            place_type: "cafe".to_string(),
            strategy: None,
            max_results: None,
        }
    }

    fn invalid_message(err: MeetingError) -> String {
        match err {
            MeetingError::InvalidInput { message } => message,
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_participant_rejected() {
        let err = planner().plan(&request(&[("A", "Sydney")])).await.unwrap_err();
        assert!(invalid_message(err).contains("at least 2 people"));
    }

    #[tokio::test]
    async fn test_unknown_strategy_rejected_before_geocoding() {
        let mut req = request(&[("A", "Sydney"), ("B", "Newcastle")]);
        req.strategy = Some("cheapest".to_string());
        let err = planner().plan(&req).await.unwrap_err();
        assert!(invalid_message(err).contains("cheapest"));
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let err = planner()
            .plan(&request(&[("A", "Sydney"), ("A", "Newcastle")]))
            .await
            .unwrap_err();
        assert!(invalid_message(err).contains("more than once"));
    }

    #[tokio::test]
    async fn test_blank_location_rejected() {
        let err = planner()
            .plan(&request(&[("A", "Sydney"), ("B", "  ")]))
            .await
            .unwrap_err();
        assert!(invalid_message(err).contains("No location"));
    }

    #[tokio::test]
    async fn test_zero_max_results_rejected() {
        let err = planner()
            .find_meeting_places(
                vec![
                    Participant::new("A", "Sydney", TransportMode::Driving),
                    Participant::new("B", "Newcastle", TransportMode::Driving),
                ],
                "cafe",
                "fairness",
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MeetingError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_address_fails_whole_search() {
        let err = planner()
            .plan(&request(&[("A", "Sydney"), ("B", "Newcastle")]))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "geocoding");
    }
}
