//! GPU error types.

use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

use super::GpuStage;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("Failed to load the Vulkan library: {0}")]
    LibraryLoad(#[from] ash::LoadingError),

    #[error("GPU unavailable: {0}")]
    Unavailable(String),

    #[error("Vulkan {found_major}.{found_minor} found, {required_major}.{required_minor} required")]
    ApiVersion {
        found_major: u32,
        found_minor: u32,
        required_major: u32,
        required_minor: u32,
    },

    #[error("No physical device exposes a compute queue")]
    NoComputeDevice,

    #[error("Format {0:?} cannot be used as a linear storage image")]
    FormatUnsupported(vk::Format),

    #[error("Failed to read shader {}: {source}", path.display())]
    ShaderMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Shader {} is not valid SPIR-V: {source}", path.display())]
    ShaderInvalid {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Earlier setup stopped at {0:?}; build a new tracer")]
    Incomplete(GpuStage),

    #[error("No memory type satisfies the output image requirements")]
    NoMemoryType,

    #[error("{step} failed: {result}")]
    Vulkan {
        step: &'static str,
        result: vk::Result,
    },
}

/// Tags a raw Vulkan result with the call that produced it
pub(crate) trait VkResultExt<T> {
    fn during(self, step: &'static str) -> Result<T, GpuError>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn during(self, step: &'static str) -> Result<T, GpuError> {
        self.map_err(|result| GpuError::Vulkan { step, result })
    }
}
