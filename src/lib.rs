//! `fairmeet` - find meeting places that are fair for everyone
//!
//! Geocodes each participant, searches for venues around their geographic
//! centre, estimates everyone's travel time per transport mode and ranks the
//! venues by how evenly that travel burden is shared.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fairness;
pub mod geocoding;
pub mod geometry;
pub mod google;
pub mod models;
pub mod places;
pub mod planner;
pub mod travel_time;
pub mod web;

// Re-export core types for public API
pub use cache::GeocodeCache;
pub use config::FairmeetConfig;
pub use error::{MeetingError, ProviderError};
pub use fairness::{FairnessMetrics, RankingStrategy};
pub use google::GoogleMapsClient;
pub use models::{Coordinate, Participant, ResolvedParticipant, ScoredVenue, TimedVenue, TransportMode, Venue};
pub use planner::{MeetingPlan, MeetingPlanner, SearchRequest};
pub use travel_time::PENALTY_SECONDS;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, MeetingError>;
