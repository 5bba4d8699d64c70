mod loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::TILE_SIZE;

pub use loader::load_config;

/// Render configuration, read once before the first frame
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RenderConfig {
    /// Requested width in pixels (rounded up to the tile size)
    #[serde(default = "default_dimension")]
    pub width: u32,
    /// Requested height in pixels (rounded up to the tile size)
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Prefer the Vulkan compute backend
    #[serde(default)]
    pub compute: bool,
    /// 4-sample supersampling on the CPU path
    #[serde(default)]
    pub supersample: bool,
    /// Worker thread count for the CPU path (default: hardware threads - 1)
    #[serde(default)]
    pub threads: Option<usize>,
    /// Precompiled SPIR-V compute shader
    #[serde(default = "default_shader_path")]
    pub shader_path: PathBuf,
    /// Output image path
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Enable the Khronos validation layer when it is installed
    #[serde(default)]
    pub gpu_validation: bool,
}

pub const DEFAULT_DIMENSION: u32 = 512;

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_shader_path() -> PathBuf {
    PathBuf::from("compute.spv")
}

fn default_output() -> PathBuf {
    PathBuf::from("output.tga")
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_dimension(),
            height: default_dimension(),
            compute: false,
            supersample: false,
            threads: None,
            shader_path: default_shader_path(),
            output: default_output(),
            gpu_validation: false,
        }
    }
}

impl RenderConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }
}

/// Frame size in pixels. Both sides are positive multiples of [`TILE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Accepts only tile-aligned, non-zero sizes
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        for (name, value) in [("width", width), ("height", height)] {
            if value == 0 || value % TILE_SIZE != 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} {value} is not a positive multiple of {TILE_SIZE}"
                )));
            }
        }
        Ok(Self { width, height })
    }

    /// Rounds both sides up to the tile size, never below one tile
    pub fn aligned(width: u32, height: u32) -> Result<Self, ConfigError> {
        Self::new(align_to_tile(width)?, align_to_tile(height)?)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

fn align_to_tile(value: u32) -> Result<u32, ConfigError> {
    let aligned = value
        .checked_add(TILE_SIZE - 1)
        .map(|v| v & !(TILE_SIZE - 1))
        .ok_or_else(|| ConfigError::Validation(format!("dimension {value} overflows when tile-aligned")))?;
    Ok(aligned.max(TILE_SIZE))
}

/// Process-scoped render state shared by whichever backends get constructed.
///
/// The resolution is resolved lazily from the config and cached; the first
/// successful value is kept for the rest of the run.
#[derive(Debug)]
pub struct RenderContext {
    config: RenderConfig,
    resolution: OnceLock<Resolution>,
}

impl RenderContext {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            resolution: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Resolve (once) and return the tile-aligned frame size
    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        if let Some(resolution) = self.resolution.get() {
            return Ok(*resolution);
        }
        let resolved = Resolution::aligned(self.config.width, self.config.height)?;
        Ok(*self.resolution.get_or_init(|| resolved))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.width, 512);
        assert_eq!(config.height, 512);
        assert!(!config.compute);
        assert_eq!(config.shader_path, PathBuf::from("compute.spv"));
    }

    #[test]
    fn test_aligned_rounds_up() {
        let res = Resolution::aligned(513, 7).unwrap();
        assert_eq!(res.width(), 516);
        assert_eq!(res.height(), 8);
    }

    #[test]
    fn test_aligned_zero_becomes_one_tile() {
        let res = Resolution::aligned(0, 0).unwrap();
        assert_eq!(res.width(), TILE_SIZE);
        assert_eq!(res.height(), TILE_SIZE);
    }

    #[test]
    fn test_aligned_overflow_is_error() {
        let result = Resolution::aligned(u32::MAX, 16);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_new_rejects_unaligned() {
        assert!(Resolution::new(10, 16).is_err());
        assert!(Resolution::new(0, 16).is_err());
        assert!(Resolution::new(16, 16).is_ok());
    }

    #[test]
    fn test_resolution_is_cached() {
        let ctx = RenderContext::new(RenderConfig {
            width: 301,
            height: 199,
            ..Default::default()
        });
        let first = ctx.resolution().unwrap();
        let second = ctx.resolution().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Resolution::new(304, 200).unwrap());
    }

    #[test]
    fn test_default_resolution() {
        let ctx = RenderContext::new(RenderConfig::default());
        assert_eq!(ctx.resolution().unwrap(), Resolution::new(512, 512).unwrap());
    }
}
