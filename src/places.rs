//! Venue discovery around a search point
//!
//! Queries a `PlacesProvider` at an initial radius and widens the radius by a
//! fixed factor, up to a ceiling, until enough unique venues are found.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::models::{Coordinate, Venue};

/// Photo size requested for venue thumbnails
pub const PHOTO_MAX_WIDTH: u32 = 300;
pub const PHOTO_MAX_HEIGHT: u32 = 200;

/// A single result of a nearby-places query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub id: String,
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub rating_count: u32,
    pub photo_ref: Option<String>,
    pub coordinate: Coordinate,
}

/// External places-search service
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Places of `place_type` within `radius_m` meters of `center`, in provider order
    async fn nearby(
        &self,
        center: Coordinate,
        radius_m: f64,
        place_type: &str,
    ) -> Result<Vec<PlaceResult>, ProviderError>;

    /// Image URL for a photo reference
    fn photo_url(&self, photo_ref: &str, max_width: u32, max_height: u32) -> String;

    /// Embeddable map URL for a named place
    fn embed_url(&self, place_name: &str) -> String;
}

/// A suggestion returned by address autocomplete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub description: String,
    pub place_id: String,
}

/// Address autocomplete, used by the presentation layer only
#[async_trait]
pub trait AutocompleteProvider: Send + Sync {
    async fn suggest(&self, partial_text: &str) -> Vec<Suggestion>;
}

/// How the search radius grows when too few venues are found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusPolicy {
    pub growth: f64,
    pub max_radius_m: f64,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self {
            growth: 1.5,
            max_radius_m: 3000.0,
        }
    }
}

/// Adaptive-radius venue search
pub struct VenueDiscovery {
    provider: Arc<dyn PlacesProvider>,
    policy: RadiusPolicy,
    call_timeout: Duration,
}

impl VenueDiscovery {
    pub fn new(provider: Arc<dyn PlacesProvider>, policy: RadiusPolicy, call_timeout: Duration) -> Self {
        Self {
            provider,
            policy,
            call_timeout,
        }
    }

    /// Up to `max_results` unique venues near `center`; provider failures yield what was found so far
    pub async fn find_nearby(
        &self,
        center: Coordinate,
        place_type: &str,
        radius: f64,
        max_results: usize,
    ) -> Vec<Venue> {
        self.try_find_nearby(center, place_type, radius, max_results)
            .await
            .unwrap_or_else(|e| {
                warn!("Places search at ({}) failed: {}", center, e);
                Vec::new()
            })
    }

    /// Like `find_nearby`, but reports a failure of the initial query
    #[instrument(skip(self, center), fields(center = %center))]
    pub async fn try_find_nearby(
        &self,
        center: Coordinate,
        place_type: &str,
        radius: f64,
        max_results: usize,
    ) -> Result<Vec<Venue>, ProviderError> {
        let mut radius = radius;
        let mut seen = HashSet::new();
        let mut venues = Vec::new();
        let mut first_attempt = true;

        loop {
            match self.query(center, radius, place_type).await {
                Ok(results) => {
                    debug!("{} places within {}m", results.len(), radius);
                    for place in results {
                        if seen.insert(place.id.clone()) {
                            venues.push(self.to_venue(place));
                        }
                    }
                }
                Err(e) if first_attempt => return Err(e),
                Err(e) => {
                    warn!("Places search at {}m failed, keeping earlier results: {}", radius, e);
                    break;
                }
            }
            first_attempt = false;

            if venues.len() >= max_results || radius >= self.policy.max_radius_m {
                break;
            }
            let next = (radius * self.policy.growth).min(self.policy.max_radius_m);
            if next <= radius {
                break;
            }
            radius = next;
        }

        venues.truncate(max_results);
        Ok(venues)
    }

    async fn query(
        &self,
        center: Coordinate,
        radius: f64,
        place_type: &str,
    ) -> Result<Vec<PlaceResult>, ProviderError> {
        tokio::time::timeout(self.call_timeout, self.provider.nearby(center, radius, place_type))
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.call_timeout)))
    }

    fn to_venue(&self, place: PlaceResult) -> Venue {
        let photo_url = place
            .photo_ref
            .as_deref()
            .map(|r| self.provider.photo_url(r, PHOTO_MAX_WIDTH, PHOTO_MAX_HEIGHT));
        let embed_url = self.provider.embed_url(&place.name);

        Venue {
            id: place.id,
            name: place.name,
            address: place.address,
            rating: place.rating,
            rating_count: place.rating_count,
            photo_url,
            embed_url,
            coordinate: place.coordinate,
        }
    }
}
