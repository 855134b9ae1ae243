//! People taking part in a meeting search

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Coordinate;
use crate::MeetingError;

/// How a participant travels to the meeting place
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TransportMode {
    pub const ALL: [TransportMode; 4] = [
        TransportMode::Driving,
        TransportMode::Walking,
        TransportMode::Bicycling,
        TransportMode::Transit,
    ];

    /// Provider-facing name of the mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Driving => "driving",
            TransportMode::Walking => "walking",
            TransportMode::Bicycling => "bicycling",
            TransportMode::Transit => "transit",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = MeetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driving" | "drive" | "car" => Ok(TransportMode::Driving),
            "walking" | "walk" | "foot" => Ok(TransportMode::Walking),
            "bicycling" | "cycling" | "bike" | "bicycle" => Ok(TransportMode::Bicycling),
            "transit" | "public_transport" | "public" => Ok(TransportMode::Transit),
            other => Err(MeetingError::invalid_input(format!(
                "Unknown transport mode '{other}'. Must be one of: driving, walking, bicycling, transit"
            ))),
        }
    }
}

/// A person supplying a starting location and a transport mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Free-text address as typed by the user
    #[serde(alias = "location")]
    pub raw_location: String,
    #[serde(default)]
    pub transport_mode: TransportMode,
}

impl Participant {
    pub fn new(name: impl Into<String>, raw_location: impl Into<String>, mode: TransportMode) -> Self {
        Self {
            name: name.into(),
            raw_location: raw_location.into(),
            transport_mode: mode,
        }
    }

    /// Attach the geocoded starting point
    #[must_use]
    pub fn resolve(self, location: Coordinate) -> ResolvedParticipant {
        ResolvedParticipant {
            participant: self,
            location,
        }
    }
}

impl FromStr for Participant {
    type Err = MeetingError;

    /// Parse `name=address[@mode]`, defaulting to driving
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s.split_once('=').ok_or_else(|| {
            MeetingError::invalid_input(format!("Expected NAME=ADDRESS[@MODE], got '{s}'"))
        })?;
        let (address, mode) = match rest.rsplit_once('@') {
            Some((address, mode)) => (address, mode.parse()?),
            None => (rest, TransportMode::default()),
        };
        let name = name.trim();
        let address = address.trim();
        if name.is_empty() || address.is_empty() {
            return Err(MeetingError::invalid_input(format!(
                "Participant needs both a name and an address: '{s}'"
            )));
        }
        Ok(Participant::new(name, address, mode))
    }
}

/// A participant whose address has been geocoded for the current search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParticipant {
    #[serde(flatten)]
    pub participant: Participant,
    pub location: Coordinate,
}

impl ResolvedParticipant {
    pub fn name(&self) -> &str {
        &self.participant.name
    }

    pub fn mode(&self) -> TransportMode {
        self.participant.transport_mode
    }
}
