pub mod gpu;
pub mod software;

use crate::config::{RenderConfig, RenderContext, Resolution};
use crate::error::{SetupError, TraceError};

pub use gpu::{GpuError, GpuStage, GpuTracer};
pub use software::SoftwareTracer;

/// A raytracing backend: prepared once for a resolution, then asked for frames.
pub trait Tracer {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Prepare every resource needed to trace frames at `resolution`
    fn setup(&mut self, resolution: Resolution) -> Result<(), SetupError>;

    /// Fill `framebuffer` (row-major ARGB32, one `u32` per pixel) with one frame
    fn trace(&mut self, framebuffer: &mut [u32]) -> Result<(), TraceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Software,
    Gpu,
}

/// The backend chosen at startup
pub enum Backend {
    Software(SoftwareTracer),
    Gpu(GpuTracer),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Software(_) => BackendKind::Software,
            Backend::Gpu(_) => BackendKind::Gpu,
        }
    }

    fn tracer(&mut self) -> &mut dyn Tracer {
        match self {
            Backend::Software(t) => t,
            Backend::Gpu(t) => t,
        }
    }
}

impl Tracer for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Software(t) => t.name(),
            Backend::Gpu(t) => t.name(),
        }
    }

    fn setup(&mut self, resolution: Resolution) -> Result<(), SetupError> {
        self.tracer().setup(resolution)
    }

    fn trace(&mut self, framebuffer: &mut [u32]) -> Result<(), TraceError> {
        self.tracer().trace(framebuffer)
    }
}

/// Choose and set up a backend for `ctx`.
///
/// With `compute` enabled the Vulkan backend is tried first; any loader or
/// setup failure is logged and the software backend is used instead.
pub fn select_backend(ctx: &RenderContext) -> Result<Backend, SetupError> {
    select_backend_with(ctx, |config| {
        let mut gpu = GpuTracer::new(&config.shader_path, config.gpu_validation);
        gpu.load()?;
        Ok(gpu)
    })
}

/// [`select_backend`] with a caller-supplied GPU loader
pub fn select_backend_with<F>(ctx: &RenderContext, load_gpu: F) -> Result<Backend, SetupError>
where
    F: FnOnce(&RenderConfig) -> Result<GpuTracer, GpuError>,
{
    let resolution = ctx.resolution()?;
    let config = ctx.config();

    if config.compute {
        match load_gpu(config) {
            Ok(mut gpu) => match gpu.setup(resolution) {
                Ok(()) => return Ok(Backend::Gpu(gpu)),
                // gpu drops here, releasing whatever setup created
                Err(e) => log::warn!("GPU setup failed ({}), falling back to software", e),
            },
            Err(e) => log::warn!("Vulkan unavailable ({}), falling back to software", e),
        }
    }

    let mut software = SoftwareTracer::new(config.supersample, config.threads);
    software.setup(resolution)?;
    log::info!(
        "Software backend ready: {}x{} with {} worker threads",
        resolution.width(),
        resolution.height(),
        software.worker_count()
    );
    Ok(Backend::Software(software))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(compute: bool) -> RenderContext {
        RenderContext::new(RenderConfig {
            width: 32,
            height: 32,
            compute,
            threads: Some(2),
            ..RenderConfig::default()
        })
    }

    #[test]
    fn test_loader_untouched_without_compute() {
        let backend = select_backend_with(&context(false), |_| -> Result<GpuTracer, GpuError> {
            panic!("GPU loader must not run")
        })
        .unwrap();
        assert_eq!(backend.kind(), BackendKind::Software);
        assert_eq!(backend.name(), "software");
    }

    #[test]
    fn test_loader_failure_falls_back() {
        let backend = select_backend_with(&context(true), |_| Err(GpuError::Unavailable("test".into()))).unwrap();
        assert_eq!(backend.kind(), BackendKind::Software);
    }

    #[test]
    fn test_setup_failure_falls_back() {
        let backend = select_backend_with(&context(true), |_| {
            Ok(GpuTracer::new("/nonexistent/compute.spv", false))
        })
        .unwrap();
        assert_eq!(backend.kind(), BackendKind::Software);
    }

    #[test]
    fn test_fallback_frame_matches_software() {
        let mut backend =
            select_backend_with(&context(true), |_| Err(GpuError::Unavailable("test".into()))).unwrap();
        let mut via_selector = vec![0u32; 32 * 32];
        backend.trace(&mut via_selector).unwrap();

        let mut direct = SoftwareTracer::new(false, Some(0));
        direct.setup(Resolution::new(32, 32).unwrap()).unwrap();
        let mut expected = vec![0u32; 32 * 32];
        direct.trace(&mut expected).unwrap();

        assert_eq!(via_selector, expected);
    }

    #[test]
    fn test_resolution_error_propagates() {
        let ctx = RenderContext::new(RenderConfig {
            width: u32::MAX,
            ..RenderConfig::default()
        });
        assert!(matches!(
            select_backend_with(&ctx, |_| Err(GpuError::NoComputeDevice)),
            Err(SetupError::Resolution(_))
        ));
    }
}
