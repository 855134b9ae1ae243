//! Geocoder adapter
//!
//! Resolves free-text addresses to coordinates through a `GeocodingProvider`,
//! consulting the shared `GeocodeCache` first. An address with no result is
//! retried once with everything after the first comma dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use crate::cache::GeocodeCache;
use crate::error::ProviderError;
use crate::models::{Coordinate, Participant, ResolvedParticipant};
use crate::{MeetingError, Result};

/// External geocoding service
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Best coordinate for `text`, or `None` when the provider has no result
    async fn geocode(&self, text: &str) -> std::result::Result<Option<Coordinate>, ProviderError>;
}

/// Geocoder with caching and simplified-address retry
pub struct Geocoder {
    provider: Arc<dyn GeocodingProvider>,
    cache: Arc<GeocodeCache>,
    call_timeout: Duration,
}

impl Geocoder {
    pub fn new(
        provider: Arc<dyn GeocodingProvider>,
        cache: Arc<GeocodeCache>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            call_timeout,
        }
    }

    /// Resolve `address`
    ///
    /// Fails with `MeetingError::Geocoding` when the address has no result and
    /// with `MeetingError::Provider` when the provider itself fails or times out.
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Coordinate> {
        if let Some(coordinate) = self.cache.get(address).await {
            debug!("Geocode cache hit for '{}'", address);
            return Ok(coordinate);
        }

        let coordinate = match self.lookup(address).await? {
            Some(coordinate) => coordinate,
            None => {
                let simplified = simplify_address(address).ok_or_else(|| MeetingError::not_found(address))?;
                debug!("No result for '{}', retrying as '{}'", address, simplified);
                self.lookup(simplified)
                    .await?
                    .ok_or_else(|| MeetingError::not_found(address))?
            }
        };

        info!("Geocoded '{}' to ({})", address, coordinate);
        self.cache.insert(address, coordinate).await;
        Ok(coordinate)
    }

    /// Geocode every participant concurrently; any failure fails the whole batch
    pub async fn resolve_participants(
        &self,
        participants: &[Participant],
    ) -> Result<Vec<ResolvedParticipant>> {
        try_join_all(participants.iter().map(|participant| async move {
            let location = self.geocode(&participant.raw_location).await.map_err(|e| {
                if matches!(e, MeetingError::Provider(_)) {
                    warn!("Geocoding {}'s address failed: {}", participant.name, e);
                }
                e.for_participant(&participant.name)
            })?;
            Ok::<_, MeetingError>(participant.clone().resolve(location))
        }))
        .await
    }

    async fn lookup(&self, text: &str) -> Result<Option<Coordinate>> {
        let outcome = tokio::time::timeout(self.call_timeout, self.provider.geocode(text))
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.call_timeout)));

        outcome.map_err(|e| {
            warn!("Geocoding provider failed for '{}': {}", text, e);
            MeetingError::Provider(e)
        })
    }
}

/// The part of an address before its first comma, if that differs from the whole
fn simplify_address(address: &str) -> Option<&str> {
    let (first, _) = address.split_once(',')?;
    let first = first.trim();
    (!first.is_empty()).then_some(first)
}
