//! Travel-time estimation
//!
//! Participants are grouped by transport mode so that each mode costs one
//! many-origins × many-destinations matrix request (split into chunks when
//! there are more destinations than the provider accepts). A cell without a
//! route, or a whole request that fails, becomes `PENALTY_SECONDS` instead of
//! aborting the search.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::ProviderError;
use crate::models::{Coordinate, ResolvedParticipant, TimedVenue, TransportMode, Venue};

/// Travel time assigned when no real route is known
pub const PENALTY_SECONDS: u64 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellStatus {
    Ok,
    NotFound,
}

/// One origin → destination entry of a travel-time matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub status: CellStatus,
    pub duration_seconds: Option<u64>,
}

impl MatrixCell {
    #[must_use]
    pub fn ok(duration_seconds: u64) -> Self {
        Self {
            status: CellStatus::Ok,
            duration_seconds: Some(duration_seconds),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: CellStatus::NotFound,
            duration_seconds: None,
        }
    }

    /// Duration of a routable cell
    #[must_use]
    pub fn seconds(&self) -> Option<u64> {
        match self.status {
            CellStatus::Ok => self.duration_seconds,
            CellStatus::NotFound => None,
        }
    }
}

/// External travel-time / distance-matrix service
#[async_trait]
pub trait TravelTimeProvider: Send + Sync {
    /// Rows follow `origins`, cells within a row follow `destinations`
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TransportMode,
    ) -> Result<Vec<Vec<MatrixCell>>, ProviderError>;
}

/// Venues annotated with travel times, plus the requests that failed
#[derive(Debug)]
pub struct TravelTimeReport {
    pub venues: Vec<TimedVenue>,
    pub failures: Vec<(TransportMode, ProviderError)>,
}

pub struct TravelTimeEstimator {
    provider: Arc<dyn TravelTimeProvider>,
    call_timeout: Duration,
    max_destinations: usize,
}

impl TravelTimeEstimator {
    pub fn new(provider: Arc<dyn TravelTimeProvider>, call_timeout: Duration, max_destinations: usize) -> Self {
        Self {
            provider,
            call_timeout,
            max_destinations: max_destinations.max(1),
        }
    }

    /// Attach a travel time for every participant to every venue
    #[instrument(skip_all, fields(participants = participants.len(), venues = venues.len()))]
    pub async fn annotate_travel_times(
        &self,
        participants: &[ResolvedParticipant],
        venues: Vec<Venue>,
    ) -> TravelTimeReport {
        let mut times: Vec<BTreeMap<String, u64>> = vec![BTreeMap::new(); venues.len()];
        if participants.is_empty() || venues.is_empty() {
            return TravelTimeReport {
                venues: zip_times(venues, times),
                failures: Vec::new(),
            };
        }

        let mut groups: BTreeMap<TransportMode, Vec<&ResolvedParticipant>> = BTreeMap::new();
        for participant in participants {
            groups.entry(participant.mode()).or_default().push(participant);
        }

        let destinations: Vec<Coordinate> = venues.iter().map(|v| v.coordinate).collect();
        let chunk_size = self.max_destinations;

        let mut jobs = Vec::new();
        for (&mode, group) in &groups {
            let origins: Vec<Coordinate> = group.iter().map(|p| p.location).collect();
            for (chunk_index, chunk) in destinations.chunks(chunk_size).enumerate() {
                jobs.push((mode, chunk_index * chunk_size, origins.clone(), chunk));
            }
        }

        info!(
            "Requesting travel times for {} transport modes in {} requests",
            groups.len(),
            jobs.len()
        );
        let responses = join_all(jobs.iter().map(|(mode, offset, origins, chunk)| async move {
            let outcome = self.request(origins, chunk, *mode).await;
            (*mode, *offset, chunk.len(), outcome)
        }))
        .await;

        let mut failures = Vec::new();
        for (mode, offset, len, outcome) in responses {
            let group = &groups[&mode];
            let rows = match outcome {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Travel-time request for mode {} failed, applying penalties: {}", mode, e);
                    failures.push((mode, e));
                    Vec::new()
                }
            };

            for (row_index, participant) in group.iter().enumerate() {
                for column in 0..len {
                    let seconds = rows
                        .get(row_index)
                        .and_then(|row| row.get(column))
                        .and_then(MatrixCell::seconds)
                        .unwrap_or(PENALTY_SECONDS);
                    times[offset + column].insert(participant.name().to_string(), seconds);
                }
            }
        }

        TravelTimeReport {
            venues: zip_times(venues, times),
            failures,
        }
    }

    /// Of `candidates`, the point where the two participants' travel times differ least
    ///
    /// Candidates either participant cannot reach are skipped; ties keep the earliest.
    pub async fn most_balanced_point(
        &self,
        a: &ResolvedParticipant,
        b: &ResolvedParticipant,
        candidates: &[Coordinate],
    ) -> Result<Option<Coordinate>, ProviderError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let (origin_a, origin_b) = ([a.location], [b.location]);
        let (rows_a, rows_b) = futures::try_join!(
            self.request(&origin_a, candidates, a.mode()),
            self.request(&origin_b, candidates, b.mode()),
        )?;
        let (Some(row_a), Some(row_b)) = (rows_a.first(), rows_b.first()) else {
            return Ok(None);
        };

        let mut best: Option<(u64, Coordinate)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let (Some(time_a), Some(time_b)) = (
                row_a.get(i).and_then(MatrixCell::seconds),
                row_b.get(i).and_then(MatrixCell::seconds),
            ) else {
                continue;
            };
            let diff = time_a.abs_diff(time_b);
            if best.is_none_or(|(best_diff, _)| diff < best_diff) {
                best = Some((diff, *candidate));
            }
        }

        if let Some((diff, point)) = best {
            debug!("Most balanced midpoint ({}) with {}s difference", point, diff);
        }
        Ok(best.map(|(_, point)| point))
    }

    async fn request(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        mode: TransportMode,
    ) -> Result<Vec<Vec<MatrixCell>>, ProviderError> {
        tokio::time::timeout(
            self.call_timeout,
            self.provider.matrix(origins, destinations, mode),
        )
        .await
        .unwrap_or(Err(ProviderError::Timeout(self.call_timeout)))
    }
}

fn zip_times(venues: Vec<Venue>, times: Vec<BTreeMap<String, u64>>) -> Vec<TimedVenue> {
    venues
        .into_iter()
        .zip(times)
        .map(|(venue, travel_times)| TimedVenue {
            venue,
            travel_times,
        })
        .collect()
}
