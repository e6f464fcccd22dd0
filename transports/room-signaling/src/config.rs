//! Configuration types for the signaling coordinator

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the signaling coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// STUN server URLs handed to every new transport engine
    pub ice_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Maximum simultaneous participant entries (default: 10, max: 32)
    pub max_participants: usize,

    /// Human-readable notification strings
    pub notifications: NotificationMessages,

    /// Logging switches
    pub logging: LoggingConfig,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Text emitted with precondition-failure notifications
///
/// Defaults are English; override per locale in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationMessages {
    /// `join_room` while already a member of a room
    pub already_in_room: String,

    /// `join_room` with an empty room id
    pub missing_room_id: String,

    /// `leave_room` while not in a room
    pub not_in_room: String,

    /// Stream readiness signalled before joining a room
    pub join_before_stream: String,

    /// `kick_participant` without admin rights
    pub not_admin: String,
}

/// Logging switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Re-emit relay `log` events through tracing
    pub relay_logs: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            max_participants: 10,
            notifications: NotificationMessages::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NotificationMessages {
    fn default() -> Self {
        Self {
            already_in_room: "Leave the current room before joining another one".to_string(),
            missing_room_id: "Room id is missing".to_string(),
            not_in_room: "You are not in a room".to_string(),
            join_before_stream: "Join a room before sending your stream".to_string(),
            not_admin: "You are not an admin".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { relay_logs: true }
    }
}

impl CoordinatorConfig {
    /// Parse configuration from a TOML document
    ///
    /// Missing keys fall back to their defaults. The result is validated.
    pub fn from_toml_str(s: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_participants` is not in range 1-32
    /// - an ICE server URL lacks a `stun:`/`turn:`/`turns:` scheme
    /// - a TURN server URL lacks a `turn:`/`turns:` scheme
    /// - any notification string is blank
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.max_participants == 0 || self.max_participants > 32 {
            return Err(Error::InvalidConfig(format!(
                "max_participants must be in range 1-32, got {}",
                self.max_participants
            )));
        }

        for url in &self.ice_servers {
            if !["stun:", "turn:", "turns:"].iter().any(|s| url.starts_with(s)) {
                return Err(Error::InvalidConfig(format!(
                    "ICE server URL must start with stun:, turn: or turns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN server URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        let n = &self.notifications;
        let texts = [
            ("already_in_room", &n.already_in_room),
            ("missing_room_id", &n.missing_room_id),
            ("not_in_room", &n.not_in_room),
            ("join_before_stream", &n.join_before_stream),
            ("not_admin", &n.not_admin),
        ];
        if let Some((key, _)) = texts.iter().find(|(_, text)| text.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "notification text '{}' must not be empty",
                key
            )));
        }

        Ok(())
    }
}
