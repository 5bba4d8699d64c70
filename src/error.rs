//! Backend error types.

use thiserror::Error;

use crate::backend::gpu::GpuError;
use crate::config::ConfigError;

/// Why a backend could not be prepared for tracing
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Resolution unavailable: {0}")]
    Resolution(#[from] ConfigError),

    #[error("GPU setup failed: {0}")]
    Gpu(#[from] GpuError),
}

/// Why a frame could not be produced
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Backend traced before a successful setup")]
    NotSetUp,

    #[error("Framebuffer holds {actual} pixels, expected {expected}")]
    FramebufferSize { expected: usize, actual: usize },

    #[error("GPU frame aborted: {0}")]
    Gpu(#[from] GpuError),
}
