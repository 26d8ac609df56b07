use crate::error::{DndError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Collision tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Use the card-only nearest-center tier before falling back to corners
    pub card_nearest_center: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            card_nearest_center: true,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pointer travel (in px) before a pressed item becomes a drag
    pub activation_distance: f64,
    /// Emit narrator sentences for session transitions
    pub announcements: bool,
    pub collision: CollisionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activation_distance: 5.0,
            announcements: true,
            collision: CollisionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DndError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if !self.activation_distance.is_finite() || self.activation_distance < 0.0 {
            return Err(DndError::ConfigError(format!(
                "activation_distance must be a non-negative number, got {}",
                self.activation_distance
            )));
        }
        Ok(())
    }
}
