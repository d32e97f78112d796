//! # Configuration
//!
//! Engine settings read from JSON.
//!
//! Every field has a default, so an empty object (or no file at all) yields a
//! working configuration. [`EngineConfig::load`] reads the file named by the
//! `VOXEL_STREAM_CONFIG` environment variable when it is set.
//!
//! ```json
//! {
//!     "world": { "side": 16, "seed": 42 },
//!     "backend": "wgpu",
//!     "selected_material": "glass"
//! }
//! ```

use std::{fmt, fs, path::Path};

use log::info;
use serde::Deserialize;

use crate::engine_state::{
    buffer_state::DEFAULT_BLOCK_SIZE, device::host_device::DEFAULT_HOST_ALIGNMENT,
    voxels::block::block_type::BlockType,
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "VOXEL_STREAM_CONFIG";

/// Errors raised while loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        /// The file
        path: String,
        /// Read failure
        source: std::io::Error,
    },
    /// The JSON does not describe a configuration
    Parse(serde_json::Error),
    /// A value is out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "cannot read {path}: {source}"),
            ConfigError::Parse(err) => write!(f, "malformed configuration: {err}"),
            ConfigError::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Streaming window settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks per window axis, even and at least 4
    pub side: i32,
    /// Terrain seed, random per process when absent
    pub seed: Option<u32>,
    /// Faces each chunk geometry region holds
    pub chunk_face_capacity: u32,
    /// Size of the arena's backing blocks in bytes
    pub arena_block_size: u64,
    /// Longest wait for the previous transfer before a scroll step is skipped
    pub transfer_wait_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            side: 24,
            seed: None,
            chunk_face_capacity: 16_384,
            arena_block_size: DEFAULT_BLOCK_SIZE,
            transfer_wait_ms: 16,
        }
    }
}

impl WorldConfig {
    /// Checks the values a window cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.side < 4 || self.side % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "window side must be even and at least 4, got {}",
                self.side
            )));
        }
        if self.chunk_face_capacity == 0 {
            return Err(ConfigError::Invalid(
                "chunk face capacity must be positive".to_string(),
            ));
        }
        if self.arena_block_size == 0 {
            return Err(ConfigError::Invalid(
                "arena block size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which graphics device backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Buffers in process memory
    #[default]
    Host,
    /// Buffers on the GPU through wgpu
    Wgpu,
}

/// Top level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Streaming window
    pub world: WorldConfig,
    /// Graphics device
    pub backend: Backend,
    /// Offset alignment of the host device
    pub host_alignment: u64,
    /// Memory cap of the host device in bytes
    pub host_memory_limit: Option<u64>,
    /// Material placed by the session
    pub selected_material: BlockType,
    /// Frames the headless demo runs
    pub demo_frames: u32,
    /// Voxels the demo viewer walks per frame
    pub demo_speed: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            backend: Backend::default(),
            host_alignment: DEFAULT_HOST_ALIGNMENT,
            host_memory_limit: None,
            selected_material: BlockType::COBBLE,
            demo_frames: 600,
            demo_speed: 0.5,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The file named by [`CONFIG_ENV_VAR`], or the defaults when it is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => {
                info!("loading configuration from {}", path);
                Self::from_file(path)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        if self.selected_material.is_air() {
            return Err(ConfigError::Invalid(
                "the selected material cannot be air".to_string(),
            ));
        }
        if !self.demo_speed.is_finite() {
            return Err(ConfigError::Invalid("demo speed must be finite".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.world.side, 24);
        assert_eq!(config.world.chunk_face_capacity, 16_384);
        assert_eq!(config.backend, Backend::Host);
    }

    #[test]
    fn partial_sections_keep_the_other_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "world": { "side": 8, "seed": 7 }, "backend": "wgpu", "selected_material": "glass" }"#,
        )
        .unwrap();
        assert_eq!(config.world.side, 8);
        assert_eq!(config.world.seed, Some(7));
        assert_eq!(config.world.transfer_wait_ms, 16);
        assert_eq!(config.backend, Backend::Wgpu);
        assert_eq!(config.selected_material, BlockType::GLASS);
    }

    #[test]
    fn odd_or_tiny_windows_are_rejected() {
        for side in [2, 5, -4] {
            let json = format!(r#"{{ "world": {{ "side": {side} }} }}"#);
            assert!(matches!(
                EngineConfig::from_json_str(&json),
                Err(ConfigError::Invalid(_))
            ));
        }
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "selected_material": "air" }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json_and_missing_files_are_reported() {
        assert!(matches!(
            EngineConfig::from_json_str("{ side: }"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/voxel-stream.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
