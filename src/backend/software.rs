//! CPU backend: detached worker threads shade tiles, the calling thread copies
//! them into the framebuffer.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use super::Tracer;
use crate::config::Resolution;
use crate::error::{SetupError, TraceError};
use crate::scene::{FrameShader, Scene, Viewport};
use crate::tile::{Tile, TileScheduler};

/// Completed tiles waiting for the writer, plus the number of workers that
/// are between registering for a claim and publishing its result.
#[derive(Debug, Default)]
struct Completed {
    tiles: VecDeque<Tile>,
    in_flight: usize,
}

/// State shared between the workers and the writer for one frame
#[derive(Debug)]
struct FrameWork {
    shader: FrameShader,
    scheduler: TileScheduler,
    completed: Mutex<Completed>,
    ready: Condvar,
}

impl FrameWork {
    fn lock_completed(&self) -> MutexGuard<'_, Completed> {
        self.completed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Worker loop: claim, shade, publish until the scheduler runs dry
    fn run_worker(&self) {
        loop {
            // Register before claiming so the writer cannot see "finished"
            // while this worker still holds an unpublished tile.
            self.lock_completed().in_flight += 1;

            let Some(coord) = self.scheduler.claim_next() else {
                self.lock_completed().in_flight -= 1;
                self.ready.notify_all();
                return;
            };

            let mut tile = Tile::new(coord);
            tile.shade(&self.shader);

            let mut completed = self.lock_completed();
            completed.tiles.push_back(tile);
            completed.in_flight -= 1;
            drop(completed);
            self.ready.notify_one();
        }
    }

    /// Writer loop: drain completed tiles until the frame is known complete
    fn drain_into(&self, framebuffer: &mut [u32]) -> usize {
        let width = self.shader.viewport.resolution.width();
        let mut copied = 0;

        loop {
            let tile = {
                let mut completed = self.lock_completed();
                loop {
                    if let Some(tile) = completed.tiles.pop_front() {
                        break tile;
                    }
                    if completed.in_flight == 0 && self.scheduler.is_finished() {
                        return copied;
                    }
                    completed = self.ready.wait(completed).unwrap_or_else(|e| e.into_inner());
                }
            };

            tile.copy_into(framebuffer, width);
            copied += 1;
        }
    }

    /// Claim, shade and copy on the calling thread only
    fn run_inline(&self, framebuffer: &mut [u32]) -> usize {
        let width = self.shader.viewport.resolution.width();
        let mut copied = 0;
        while let Some(coord) = self.scheduler.claim_next() {
            let mut tile = Tile::new(coord);
            tile.shade(&self.shader);
            tile.copy_into(framebuffer, width);
            copied += 1;
        }
        copied
    }
}

/// Hardware threads minus the calling thread, zero when detection fails
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(0)
}

/// Tile-parallel CPU raytracer
#[derive(Debug)]
pub struct SoftwareTracer {
    scene: Scene,
    supersample: bool,
    workers: usize,
    shader: Option<FrameShader>,
}

impl SoftwareTracer {
    pub fn new(supersample: bool, workers: Option<usize>) -> Self {
        Self {
            scene: Scene::default(),
            supersample,
            workers: workers.unwrap_or_else(default_worker_count),
            shader: None,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Spawn detached workers; returns how many actually started
    fn spawn_workers(work: &Arc<FrameWork>, count: usize) -> usize {
        let mut spawned = 0;
        for i in 0..count {
            let work = Arc::clone(work);
            let builder = thread::Builder::new().name(format!("rt-worker-{i}"));
            match builder.spawn(move || work.run_worker()) {
                // Handle dropped: the thread detaches and exits once the
                // scheduler is finished.
                Ok(_) => spawned += 1,
                Err(e) => log::warn!("Failed to spawn worker {}: {}", i, e),
            }
        }
        spawned
    }
}

impl Tracer for SoftwareTracer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn setup(&mut self, resolution: Resolution) -> Result<(), SetupError> {
        let viewport = Viewport::new(resolution);
        log::debug!(
            "Software viewport {:?}, pixel step {:?}",
            viewport.size,
            viewport.pixel_size
        );
        self.shader = Some(FrameShader::new(self.scene, viewport, self.supersample));
        Ok(())
    }

    fn trace(&mut self, framebuffer: &mut [u32]) -> Result<(), TraceError> {
        let shader = self.shader.ok_or(TraceError::NotSetUp)?;
        let resolution = shader.viewport.resolution;
        if framebuffer.len() != resolution.pixel_count() {
            return Err(TraceError::FramebufferSize {
                expected: resolution.pixel_count(),
                actual: framebuffer.len(),
            });
        }

        let work = Arc::new(FrameWork {
            shader,
            scheduler: TileScheduler::new(resolution),
            completed: Mutex::new(Completed::default()),
            ready: Condvar::new(),
        });
        let total = work.scheduler.tile_count();

        let spawned = if self.workers > 0 {
            Self::spawn_workers(&work, self.workers)
        } else {
            0
        };

        let copied = if spawned > 0 {
            log::info!("Tracing {} tiles on {} worker threads", total, spawned);
            work.drain_into(framebuffer)
        } else {
            log::info!("Tracing {} tiles on the calling thread", total);
            work.run_inline(framebuffer)
        };

        debug_assert_eq!(copied, total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::scene::BACKGROUND_TOP;

    const SENTINEL: u32 = 0x0123_4567;

    fn render(width: u32, height: u32, workers: usize, supersample: bool) -> Vec<u32> {
        let mut tracer = SoftwareTracer::new(supersample, Some(workers));
        tracer.setup(Resolution::new(width, height).unwrap()).unwrap();
        let mut framebuffer = vec![SENTINEL; (width * height) as usize];
        tracer.trace(&mut framebuffer).unwrap();
        framebuffer
    }

    #[test]
    fn test_trace_before_setup_fails() {
        let mut tracer = SoftwareTracer::new(false, Some(0));
        let mut framebuffer = vec![0u32; 16];
        assert!(matches!(tracer.trace(&mut framebuffer), Err(TraceError::NotSetUp)));
    }

    #[test]
    fn test_framebuffer_size_checked() {
        let mut tracer = SoftwareTracer::new(false, Some(0));
        tracer.setup(Resolution::new(8, 8).unwrap()).unwrap();
        let mut framebuffer = vec![0u32; 63];
        assert!(matches!(
            tracer.trace(&mut framebuffer),
            Err(TraceError::FramebufferSize { expected: 64, actual: 63 })
        ));
    }

    #[test]
    fn test_every_pixel_written() {
        for workers in [0, 1, 2, 7] {
            let framebuffer = render(64, 48, workers, false);
            assert!(
                framebuffer.iter().all(|&p| p != SENTINEL),
                "unwritten pixels with {workers} workers"
            );
        }
    }

    #[test]
    fn test_threaded_matches_inline() {
        let inline = render(96, 64, 0, false);
        for workers in [1, 3, 8] {
            assert_eq!(render(96, 64, workers, false), inline);
        }
    }

    #[test]
    fn test_repeated_frames_are_identical() {
        let mut tracer = SoftwareTracer::new(false, Some(4));
        tracer.setup(Resolution::new(32, 32).unwrap()).unwrap();
        let mut first = vec![0u32; 32 * 32];
        let mut second = vec![0u32; 32 * 32];
        tracer.trace(&mut first).unwrap();
        tracer.trace(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scenario_512() {
        let framebuffer = render(512, 512, 3, false);

        assert_eq!(framebuffer[0], BACKGROUND_TOP.to_argb32());
        // Top-middle ray passes above the sphere
        assert_eq!(framebuffer[256], Scene::default().background(0, 512).to_argb32());

        let center = Color::from_argb32(framebuffer[256 * 512 + 256]);
        assert!((center.r - 0.5).abs() < 0.01);
        assert!((center.g - 0.5).abs() < 0.01);
        assert!((center.b - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_supersampled_frame_complete() {
        let framebuffer = render(64, 64, 2, true);
        assert!(framebuffer.iter().all(|&p| p >> 24 == 0xff));
    }
}
