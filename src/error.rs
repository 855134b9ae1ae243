//! Error types and handling for the `fairmeet` meeting-place search

use std::time::Duration;

use thiserror::Error;

/// Main error type surfaced by a meeting-place search
#[derive(Error, Debug)]
pub enum MeetingError {
    /// Input validation errors (too few people, empty coordinate lists, unknown strategy)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// An address could not be resolved to coordinates
    #[error("Geocoding error: could not resolve '{address}': {reason}")]
    Geocoding {
        address: String,
        participant: Option<String>,
        reason: String,
    },

    /// A provider call failed at the transport level
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Transport-level failure of a single call to an external maps provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit error: {0}")]
    RateLimited(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl MeetingError {
    /// Create a new input validation error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a geocoding error for an address that produced no result
    pub fn not_found<S: Into<String>>(address: S) -> Self {
        Self::Geocoding {
            address: address.into(),
            participant: None,
            reason: "no result".to_string(),
        }
    }

    /// Attach the participant whose address failed to geocode
    #[must_use]
    pub fn for_participant(self, name: &str) -> Self {
        match self {
            Self::Geocoding {
                address, reason, ..
            } => Self::Geocoding {
                address,
                participant: Some(name.to_string()),
                reason,
            },
            other => other,
        }
    }

    /// Short label of the pipeline stage that failed
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            MeetingError::InvalidInput { .. } => "input",
            MeetingError::Geocoding { .. } => "geocoding",
            MeetingError::Provider(_) => "provider",
            MeetingError::Config { .. } => "config",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            MeetingError::InvalidInput { message } => format!("Invalid input: {message}"),
            MeetingError::Geocoding {
                address,
                participant: Some(name),
                ..
            } => format!("Could not find a location for {name}: '{address}'. Please check the address."),
            MeetingError::Geocoding { address, .. } => {
                format!("Could not find a location for '{address}'. Please check the address.")
            }
            MeetingError::Provider(_) => {
                "Unable to reach the maps service. Please try again later.".to_string()
            }
            MeetingError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
        }
    }
}
