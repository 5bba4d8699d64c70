//! Vulkan compute backend
//!
//! Setup walks a fixed ladder of stages. A failure at any rung leaves the
//! tracer holding only what was built so far, which is released when it drops.

pub mod commands;
pub mod device;
pub mod error;
pub mod frame;
pub mod handle;
pub mod instance;
pub mod pipeline;

use std::path::{Path, PathBuf};

pub use commands::CommandResources;
pub use device::GpuDevice;
pub use error::GpuError;
pub use instance::GpuInstance;
pub use pipeline::{BackgroundPushConstants, ComputePipeline};

use super::Tracer;
use crate::config::Resolution;
use crate::error::{SetupError, TraceError};
use crate::scene::Scene;

/// How far setup has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GpuStage {
    Unloaded,
    Loaded,
    InstanceCreated,
    DeviceCreated,
    PipelineReady,
    CommandReady,
    Tracing,
}

pub struct GpuTracer {
    // Field order is teardown order
    commands: Option<CommandResources>,
    pipeline: Option<ComputePipeline>,
    device: Option<GpuDevice>,
    instance: Option<GpuInstance>,
    entry: Option<ash::Entry>,

    stage: GpuStage,
    resolution: Option<Resolution>,
    shader_path: PathBuf,
    validation: bool,
    scene: Scene,
}

impl GpuTracer {
    pub fn new(shader_path: impl AsRef<Path>, validation: bool) -> Self {
        Self {
            commands: None,
            pipeline: None,
            device: None,
            instance: None,
            entry: None,
            stage: GpuStage::Unloaded,
            resolution: None,
            shader_path: shader_path.as_ref().to_path_buf(),
            validation,
            scene: Scene::default(),
        }
    }

    /// Load the system Vulkan library
    pub fn load(&mut self) -> Result<(), GpuError> {
        if self.entry.is_some() {
            return Ok(());
        }
        // Safety: the loader library is trusted to be a conforming Vulkan ICD loader
        let entry = unsafe { ash::Entry::load()? };
        log::debug!("Vulkan loader opened");
        self.entry = Some(entry);
        self.stage = GpuStage::Loaded;
        Ok(())
    }

    pub fn stage(&self) -> GpuStage {
        self.stage
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name.as_str())
    }

    fn build(&mut self) -> Result<(), GpuError> {
        self.load()?;
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| GpuError::Unavailable("Vulkan loader missing".into()))?;

        let instance = GpuInstance::new(entry, self.validation)?;
        let instance = self.instance.insert(instance);
        self.stage = GpuStage::InstanceCreated;

        let device = self.device.insert(GpuDevice::new(instance)?);
        self.stage = GpuStage::DeviceCreated;

        self.pipeline = Some(ComputePipeline::new(device, &self.shader_path)?);
        self.stage = GpuStage::PipelineReady;

        self.commands = Some(CommandResources::new(device)?);
        self.stage = GpuStage::CommandReady;
        Ok(())
    }

    fn run_frame(&self, framebuffer: &mut [u32]) -> Result<(), TraceError> {
        let (Some(device), Some(pipeline), Some(commands), Some(resolution)) = (
            self.device.as_ref(),
            self.pipeline.as_ref(),
            self.commands.as_ref(),
            self.resolution,
        ) else {
            return Err(TraceError::NotSetUp);
        };
        if framebuffer.len() != resolution.pixel_count() {
            return Err(TraceError::FramebufferSize {
                expected: resolution.pixel_count(),
                actual: framebuffer.len(),
            });
        }
        let push = BackgroundPushConstants::from_scene(&self.scene);
        frame::trace_frame(device, pipeline, commands, resolution, &push, framebuffer)?;
        Ok(())
    }
}

impl Tracer for GpuTracer {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn setup(&mut self, resolution: Resolution) -> Result<(), SetupError> {
        match self.stage {
            GpuStage::Unloaded | GpuStage::Loaded => {}
            GpuStage::CommandReady => {
                log::debug!("GPU already set up, switching to {}x{}", resolution.width(), resolution.height());
                self.resolution = Some(resolution);
                return Ok(());
            }
            stage => return Err(GpuError::Incomplete(stage).into()),
        }
        if let Err(e) = self.build() {
            log::error!("GPU setup stopped after {:?}: {}", self.stage, e);
            return Err(e.into());
        }
        self.resolution = Some(resolution);
        log::info!(
            "GPU backend ready on {} at {}x{}",
            self.device_name().unwrap_or("unknown device"),
            resolution.width(),
            resolution.height()
        );
        Ok(())
    }

    fn trace(&mut self, framebuffer: &mut [u32]) -> Result<(), TraceError> {
        if self.stage != GpuStage::CommandReady {
            return Err(TraceError::NotSetUp);
        }
        self.stage = GpuStage::Tracing;
        let result = self.run_frame(framebuffer);
        self.stage = GpuStage::CommandReady;
        result
    }
}
