//! Venue records for each stage of the search pipeline
//!
//! - `Venue`: as discovered by the places search, without travel times
//! - `TimedVenue`: a venue plus one travel time per participant
//! - `ScoredVenue`: a timed venue plus its fairness metrics

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Coordinate;
use crate::fairness::FairnessMetrics;
use crate::travel_time::PENALTY_SECONDS;

/// A candidate meeting place returned by the places provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Provider-assigned identity
    pub id: String,
    pub name: String,
    pub address: String,
    /// Average rating in [0, 5], `None` when the provider has none
    pub rating: Option<f64>,
    pub rating_count: u32,
    pub photo_url: Option<String>,
    pub embed_url: String,
    pub coordinate: Coordinate,
}

impl Venue {
    /// Identity used when merging venues found around different search points
    #[must_use]
    pub fn merge_key(&self) -> (String, u64, u64) {
        (
            self.name.clone(),
            self.coordinate.latitude.to_bits(),
            self.coordinate.longitude.to_bits(),
        )
    }
}

/// A venue with travel times in seconds keyed by participant name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedVenue {
    #[serde(flatten)]
    pub venue: Venue,
    pub travel_times: BTreeMap<String, u64>,
}

impl TimedVenue {
    /// True when every participant has a real route to this venue
    #[must_use]
    pub fn is_complete(&self, participant_count: usize) -> bool {
        self.travel_times.len() == participant_count
            && self.travel_times.values().all(|&t| t < PENALTY_SECONDS)
    }
}

/// A fully evaluated venue, ready for ranking and presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredVenue {
    #[serde(flatten)]
    pub venue: Venue,
    pub travel_times: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub metrics: FairnessMetrics,
}

impl ScoredVenue {
    /// Rating used for ordering, unknown ratings count as zero
    #[must_use]
    pub fn rating_or_zero(&self) -> f64 {
        self.venue.rating.unwrap_or(0.0)
    }
}

impl fmt::Display for ScoredVenue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.venue.name)?;
        writeln!(f, "   📍 {}", self.venue.address)?;
        match self.venue.rating {
            Some(rating) => writeln!(
                f,
                "   ⭐ {rating:.1}/5 ({} reviews)",
                self.venue.rating_count
            )?,
            None => writeln!(f, "   ⭐ not rated")?,
        }
        writeln!(f, "   🚶 Travel times:")?;
        for (name, seconds) in &self.travel_times {
            writeln!(f, "      {name}: {} minutes", seconds / 60)?;
        }
        writeln!(f, "   Max travel time: {} minutes", self.metrics.max_time / 60)?;
        writeln!(f, "   Total travel time: {} minutes", self.metrics.total_time / 60)?;
        writeln!(f, "   Fairness score: {:.2}", self.metrics.fairness_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(name: &str, lat: f64, lng: f64) -> Venue {
        Venue {
            id: format!("id_{name}"),
            name: name.to_string(),
            address: "1 Test St".to_string(),
            rating: Some(4.2),
            rating_count: 10,
            photo_url: None,
            embed_url: String::new(),
            coordinate: Coordinate::new(lat, lng).unwrap(),
        }
    }

    #[test]
    fn test_merge_key_ignores_provider_id() {
        let a = venue("Cafe", 1.0, 2.0);
        let mut b = venue("Cafe", 1.0, 2.0);
        b.id = "other".to_string();
        assert_eq!(a.merge_key(), b.merge_key());
        assert_ne!(a.merge_key(), venue("Cafe", 1.0, 2.5).merge_key());
    }

    #[test]
    fn test_is_complete() {
        let mut timed = TimedVenue {
            venue: venue("Cafe", 1.0, 2.0),
            travel_times: BTreeMap::from([("A".to_string(), 600), ("B".to_string(), 900)]),
        };
        assert!(timed.is_complete(2));
        assert!(!timed.is_complete(3));

        timed.travel_times.insert("B".to_string(), PENALTY_SECONDS);
        assert!(!timed.is_complete(2));
    }

    #[test]
    fn test_display_lists_minutes() {
        let scored = ScoredVenue {
            venue: venue("Cafe", 1.0, 2.0),
            travel_times: BTreeMap::from([("A".to_string(), 600), ("B".to_string(), 1200)]),
            metrics: FairnessMetrics::from_times([600, 1200]),
        };
        let text = scored.to_string();
        assert!(text.contains("Cafe"));
        assert!(text.contains("A: 10 minutes"));
        assert!(text.contains("Max travel time: 20 minutes"));
    }
}
