use std::fs;
use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FlameError, Result};
use crate::model::{palettes, ColorMap, Particle, SystemDef};

/// Everything a generator needs besides the system itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Histogram width in cells.
    pub width: u32,
    /// Histogram height in cells.
    pub height: u32,
    /// Particle lifetime in iterations. `-1` is immortal.
    pub ttl: i32,
    /// Iterations per run. `None` runs until cancelled.
    pub iterations: Option<u32>,
    /// Fixed seed for reproducible output. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Iterations per batch for background generation (the histogram lock is
    /// released between batches).
    pub batch_size: u32,
    /// Named palette. `None` accumulates white weighted by particle color.
    pub palette: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            ttl: 20,
            iterations: Some(1_000_000),
            seed: None,
            batch_size: 10_000,
            palette: None,
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FlameError::configuration(format!(
                "histogram size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.batch_size == 0 {
            return Err(FlameError::configuration("batch_size must be positive"));
        }
        if self.ttl < Particle::IMMORTAL {
            return Err(FlameError::configuration(format!(
                "ttl must be -1 (immortal) or non-negative, got {}",
                self.ttl
            )));
        }
        self.color_map().map(|_| ())
    }

    /// Resolve the configured palette.
    pub fn color_map(&self) -> Result<Option<Arc<dyn ColorMap>>> {
        let Some(name) = &self.palette else {
            return Ok(None);
        };
        let gradient = palettes::by_name(name).ok_or_else(|| {
            FlameError::configuration(format!(
                "unknown palette '{name}' (available: {})",
                palettes::NAMES.join(", ")
            ))
        })?;
        Ok(Some(Arc::new(gradient)))
    }
}

/// Load and validate a system description.
pub fn load_system(path: &Path) -> Result<SystemDef> {
    let system: SystemDef = read_json(path)?;
    system.validate()?;
    Ok(system)
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}
