//! rt-compute: render one frame of the sphere scene to a TGA file
//!
//! Uses the Vulkan compute backend when `--compute` is given and a GPU is
//! usable, the multithreaded CPU backend otherwise.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

use rt_compute::config::load_config;
use rt_compute::output::save_tga;
use rt_compute::{select_backend, RenderConfig, RenderContext, Tracer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Parser)]
#[command(name = "rt-compute")]
#[command(version)]
#[command(about = "Sphere raytracer with CPU and Vulkan compute backends")]
struct Cli {
    /// Optional YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame width in pixels (rounded up to the tile size)
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels (rounded up to the tile size)
    #[arg(long)]
    height: Option<u32>,

    /// Try the Vulkan compute backend first
    #[arg(long)]
    compute: bool,

    /// 4x supersampling on the CPU backend
    #[arg(long)]
    supersample: bool,

    /// CPU worker threads (default: hardware threads - 1)
    #[arg(long)]
    threads: Option<usize>,

    /// SPIR-V compute shader
    #[arg(long, value_name = "PATH")]
    shader: Option<PathBuf>,

    /// Output TGA path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable Vulkan validation layers if installed
    #[arg(long)]
    validation: bool,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,
}

impl Cli {
    fn apply(&self, config: &mut RenderConfig) {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if self.compute {
            config.compute = true;
        }
        if self.supersample {
            config.supersample = true;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if let Some(shader) = &self.shader {
            config.shader_path = shader.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if self.validation {
            config.gpu_validation = true;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = cli.log_level {
        logger.filter_level(level.into());
    }
    logger.init();

    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    cli.apply(&mut config);
    log::debug!("Config: {:?}", config);

    let ctx = RenderContext::new(config);
    let resolution = ctx.resolution().context("resolving frame size")?;
    let mut framebuffer = vec![0u32; resolution.pixel_count()];

    let mut backend = select_backend(&ctx).context("no usable backend")?;
    log::info!(
        "Rendering {}x{} with the {} backend",
        resolution.width(),
        resolution.height(),
        backend.name()
    );

    let start = Instant::now();
    backend.trace(&mut framebuffer).context("tracing frame")?;
    log::info!("Frame traced in {:.2?}", start.elapsed());

    save_tga(&ctx.config().output, resolution, &framebuffer).context("saving output")?;
    Ok(())
}
