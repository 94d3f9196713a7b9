//! Error types for the robot vacuum integration.

use thiserror::Error;

use crate::session::InitPhase;

/// Result type for robovac operations.
pub type Result<T> = std::result::Result<T, RobovacError>;

/// Errors that can occur while synchronizing a robot with the state tree.
#[derive(Debug, Error)]
pub enum RobovacError {
    /// State store rejected a declaration or write
    #[error("State store error: {0}")]
    Store(String),

    /// Write to a state that was never declared
    #[error("State not declared: {0}")]
    UndeclaredState(String),

    /// Device transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Map or room service failure
    #[error("Map service error: {0}")]
    Map(String),

    /// Consumable service failure
    #[error("Consumable service error: {0}")]
    Consumables(String),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload could not be interpreted at all
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A sequential initialization phase failed and the sequence was aborted
    #[error("Initialization aborted in phase {phase}: {source}")]
    Initialization {
        phase: InitPhase,
        #[source]
        source: Box<RobovacError>,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Robovac error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RobovacError {
    /// Wrap an error with the initialization phase it aborted.
    pub fn in_phase(self, phase: InitPhase) -> Self {
        Self::Initialization {
            phase,
            source: Box::new(self),
        }
    }

    /// The initialization phase that failed, if this error aborted one.
    pub fn phase(&self) -> Option<InitPhase> {
        match self {
            Self::Initialization { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RobovacError::UndeclaredState("robovac.0.deviceStatus.state".to_string());
        assert!(error.to_string().contains("robovac.0.deviceStatus.state"));

        let error = RobovacError::Transport("timeout".to_string());
        assert_eq!(error.to_string(), "Transport error: timeout");
    }

    #[test]
    fn test_in_phase_keeps_source() {
        let error = RobovacError::Map("no floors".to_string()).in_phase(InitPhase::MultiMaps);
        assert_eq!(error.phase(), Some(InitPhase::MultiMaps));
        assert!(error.to_string().contains("no floors"));
        assert!(error.to_string().contains("multi_maps"));
    }
}
