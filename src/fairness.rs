//! Fairness metrics and venue ranking

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{ScoredVenue, TimedVenue};
use crate::{MeetingError, Result};

/// Weight of the worst-case travel time in the composite fairness score
pub const MAX_TIME_WEIGHT: f64 = 0.1;

/// Travel-time statistics for one venue; lower `fairness_score` is fairer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    pub max_time: u64,
    pub total_time: u64,
    /// Population variance of the travel times, in seconds²
    pub variance: f64,
    pub fairness_score: f64,
}

impl FairnessMetrics {
    /// Metrics over a set of travel times in seconds; an empty set scores zero
    #[must_use]
    pub fn from_times(times: impl IntoIterator<Item = u64>) -> Self {
        let mut times: Vec<u64> = times.into_iter().collect();
        if times.is_empty() {
            return Self::default();
        }
        // Fixed summation order keeps the result independent of participant order
        times.sort_unstable();

        let max_time = times.last().copied().unwrap_or(0);
        let total_time: u64 = times.iter().sum();
        let k = times.len() as f64;
        let mean = total_time as f64 / k;
        let variance = times
            .iter()
            .map(|&t| {
                let d = t as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / k;

        Self {
            max_time,
            total_time,
            variance,
            fairness_score: variance + MAX_TIME_WEIGHT * max_time as f64,
        }
    }
}

/// Compute the metrics of a venue from its travel times
#[must_use]
pub fn score(venue: TimedVenue) -> ScoredVenue {
    let metrics = FairnessMetrics::from_times(venue.travel_times.values().copied());
    ScoredVenue {
        venue: venue.venue,
        travel_times: venue.travel_times,
        metrics,
    }
}

/// Order in which ranked venues are returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Ascending fairness score
    #[default]
    Fairness,
    /// Ascending worst-case travel time
    MinimizeMax,
    /// Ascending total travel time
    MinimizeTotal,
    /// Descending rating, fairer venue first among equal ratings
    Rating,
}

impl RankingStrategy {
    pub const ALL: [RankingStrategy; 4] = [
        RankingStrategy::Fairness,
        RankingStrategy::MinimizeMax,
        RankingStrategy::MinimizeTotal,
        RankingStrategy::Rating,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingStrategy::Fairness => "fairness",
            RankingStrategy::MinimizeMax => "minimize_max",
            RankingStrategy::MinimizeTotal => "minimize_total",
            RankingStrategy::Rating => "rating",
        }
    }

    fn compare(&self, a: &ScoredVenue, b: &ScoredVenue) -> Ordering {
        match self {
            RankingStrategy::Fairness => a
                .metrics
                .fairness_score
                .total_cmp(&b.metrics.fairness_score)
                .then(a.metrics.max_time.cmp(&b.metrics.max_time)),
            RankingStrategy::MinimizeMax => a.metrics.max_time.cmp(&b.metrics.max_time),
            RankingStrategy::MinimizeTotal => a.metrics.total_time.cmp(&b.metrics.total_time),
            RankingStrategy::Rating => b
                .rating_or_zero()
                .total_cmp(&a.rating_or_zero())
                .then(a.metrics.fairness_score.total_cmp(&b.metrics.fairness_score)),
        }
    }
}

impl fmt::Display for RankingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingStrategy {
    type Err = MeetingError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RankingStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| {
                MeetingError::invalid_input(format!(
                    "Unknown ranking strategy '{s}', expected one of: fairness, minimize_max, minimize_total, rating"
                ))
            })
    }
}

/// Sort venues by `strategy`; equal venues keep their incoming order
#[must_use]
pub fn rank(mut venues: Vec<ScoredVenue>, strategy: RankingStrategy) -> Vec<ScoredVenue> {
    venues.sort_by(|a, b| strategy.compare(a, b));
    venues
}
