//! Data models for the fairmeet search
//!
//! This module contains the core domain models organized by concern:
//! - Coordinate: WGS-84 positions
//! - Participant: people, their addresses and transport modes
//! - Venue: candidate meeting places at each pipeline stage

pub mod coordinate;
pub mod participant;
pub mod venue;

// Re-export all public types for convenient access
pub use coordinate::Coordinate;
pub use participant::{Participant, ResolvedParticipant, TransportMode};
pub use venue::{ScoredVenue, TimedVenue, Venue};
