use rt_compute::backend::{select_backend, select_backend_with, GpuError, SoftwareTracer};
use rt_compute::color::Color;
use rt_compute::output::save_tga;
use rt_compute::scene::BACKGROUND_TOP;
use rt_compute::{BackendKind, RenderConfig, RenderContext, Resolution, Tracer};

fn config(width: u32, height: u32) -> RenderConfig {
    RenderConfig {
        width,
        height,
        threads: Some(3),
        ..RenderConfig::default()
    }
}

#[test]
fn test_default_frame_to_tga() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.tga");
    let ctx = RenderContext::new(RenderConfig {
        output: output.clone(),
        ..config(512, 512)
    });

    let resolution = ctx.resolution().unwrap();
    let mut framebuffer = vec![0u32; resolution.pixel_count()];
    let mut backend = select_backend(&ctx).unwrap();
    assert_eq!(backend.kind(), BackendKind::Software);
    backend.trace(&mut framebuffer).unwrap();

    assert_eq!(framebuffer[0], BACKGROUND_TOP.to_argb32());
    let center = Color::from_argb32(framebuffer[256 * 512 + 256]);
    assert!((center.b - 1.0).abs() < 0.01);

    save_tga(&ctx.config().output, resolution, &framebuffer).unwrap();
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), 18 + 512 * 512 * 4);
    assert_eq!(bytes[2], 2);
    assert_eq!(bytes[16], 32);
    assert_eq!(bytes[17], 0x28);
    // First pixel, B,G,R,A
    assert_eq!(&bytes[18..22], &BACKGROUND_TOP.to_argb32().to_le_bytes());
}

#[test]
fn test_unaligned_size_is_rounded_up() {
    let ctx = RenderContext::new(config(30, 1));
    let resolution = ctx.resolution().unwrap();
    assert_eq!((resolution.width(), resolution.height()), (32, 4));

    let mut framebuffer = vec![0u32; resolution.pixel_count()];
    select_backend(&ctx).unwrap().trace(&mut framebuffer).unwrap();
    assert!(framebuffer.iter().all(|&p| p >> 24 == 0xff));
}

#[test]
fn test_compute_request_without_gpu_falls_back() {
    let ctx = RenderContext::new(RenderConfig {
        compute: true,
        ..config(64, 32)
    });
    let mut backend =
        select_backend_with(&ctx, |_| Err(GpuError::Unavailable("no device".into()))).unwrap();
    assert_eq!(backend.kind(), BackendKind::Software);

    let mut framebuffer = vec![0u32; 64 * 32];
    backend.trace(&mut framebuffer).unwrap();

    let mut reference = SoftwareTracer::new(false, Some(1));
    reference.setup(Resolution::new(64, 32).unwrap()).unwrap();
    let mut expected = vec![0u32; 64 * 32];
    reference.trace(&mut expected).unwrap();
    assert_eq!(framebuffer, expected);
}

/// Runs only when a Vulkan device and a compiled `shaders/compute.spv` exist
#[test]
fn test_gpu_matches_software_when_available() {
    let shader = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders/compute.spv");
    if !shader.exists() {
        return;
    }
    let ctx = RenderContext::new(RenderConfig {
        compute: true,
        shader_path: shader,
        ..config(64, 64)
    });
    let Ok(mut backend) = select_backend(&ctx) else {
        return;
    };
    if backend.kind() != BackendKind::Gpu {
        return;
    }

    let mut gpu_frame = vec![0u32; 64 * 64];
    backend.trace(&mut gpu_frame).unwrap();
    let mut gpu_again = vec![0u32; 64 * 64];
    backend.trace(&mut gpu_again).unwrap();
    assert_eq!(gpu_frame, gpu_again);

    let mut cpu = SoftwareTracer::new(false, Some(0));
    cpu.setup(Resolution::new(64, 64).unwrap()).unwrap();
    let mut cpu_frame = vec![0u32; 64 * 64];
    cpu.trace(&mut cpu_frame).unwrap();

    // Float math may differ by a unit per channel, and silhouette pixels may flip
    let close = |a: u32, b: u32| {
        [0, 8, 16, 24]
            .iter()
            .all(|s| (((a >> s) & 0xff) as i32 - ((b >> s) & 0xff) as i32).abs() <= 2)
    };
    let mismatched = gpu_frame.iter().zip(&cpu_frame).filter(|(g, c)| !close(**g, **c)).count();
    assert!(mismatched <= 64 * 64 / 100, "{mismatched} pixels differ");
}
