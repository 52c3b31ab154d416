//! Renderer configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::GraphicsApi;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Fixed descriptor heap/pool capacities.
///
/// Heaps never grow; exceeding a capacity is a reported error, so
/// these are sized for the application's peak working set up front.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DescriptorCapacities {
    /// Render-target view slots
    pub render_target: u32,
    /// Depth-stencil view slots
    pub depth_stencil: u32,
    /// CBV/SRV/UAV slots (CPU-visible)
    pub shader_resource: u32,
    /// Sampler slots
    pub sampler: u32,
    /// Shader-visible CBV/SRV/UAV slots
    pub shader_visible: u32,
    /// Shader-visible sampler slots
    pub shader_visible_sampler: u32,
}

impl Default for DescriptorCapacities {
    fn default() -> Self {
        Self {
            render_target: 256,
            depth_stencil: 128,
            shader_resource: 4096,
            sampler: 256,
            shader_visible: 2048,
            shader_visible_sampler: 256,
        }
    }
}

/// Renderer construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Which native API to drive
    pub api: GraphicsApi,
    /// Enable the native validation/debug layer
    pub enable_validation: bool,
    /// Descriptor heap and pool capacities
    pub descriptors: DescriptorCapacities,
    /// Maximum descriptor sets the Vulkan pool can hold
    pub max_descriptor_sets: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            api: GraphicsApi::default(),
            enable_validation: cfg!(debug_assertions),
            descriptors: DescriptorCapacities::default(),
            max_descriptor_sets: 1024,
        }
    }
}

impl RendererConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(std::fs::write(path, contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = RendererConfig {
            api: GraphicsApi::Vulkan,
            enable_validation: true,
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.api, config.api);
        assert_eq!(parsed.descriptors.shader_visible, config.descriptors.shader_visible);
    }
}
