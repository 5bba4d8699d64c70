//! Dual-backend raytracer
//!
//! Renders a camera, one sphere and a gradient background into a caller-owned
//! ARGB32 framebuffer, either on a pool of CPU worker threads pulling square
//! tiles, or with a Vulkan compute shader. GPU setup failures fall back to the
//! CPU path.

pub mod backend;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod output;
pub mod scene;
pub mod tile;

pub use backend::{select_backend, Backend, BackendKind, Tracer};
pub use config::{RenderConfig, RenderContext, Resolution};
pub use error::{SetupError, TraceError};

/// Edge length of a square tile in pixels
pub const TILE_SIZE: u32 = 4;

/// Pixels per tile
pub const TILE_PIXELS: usize = (TILE_SIZE * TILE_SIZE) as usize;

const _: () = assert!(TILE_SIZE > 0 && TILE_SIZE.is_power_of_two(), "tile size needs to be a power of 2");
