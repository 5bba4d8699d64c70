//! The fixed test scene and its per-pixel shading
//!
//! A camera at `(0, 0, 1)` looks down -Z at a unit sphere centered on
//! `(0, 0, -2)`. Hits are colored by their surface normal, misses by a
//! vertical gradient between two background colors.

use glam::{Vec2, Vec3};

use crate::color::{remap, Color};
use crate::config::Resolution;
use crate::geometry::{Ray, Sphere};

pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 1.0);
pub const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 0.0, -2.0);
pub const SPHERE_RADIUS: f32 = 1.0;

/// Gradient color at the top row
pub const BACKGROUND_TOP: Color = Color::rgb(0.5, 0.7, 1.0);
/// Gradient color approached at the bottom row
pub const BACKGROUND_BOTTOM: Color = Color::rgb(1.0, 1.0, 1.0);

/// Sub-pixel offsets for 4-sample supersampling
const SUPERSAMPLE_OFFSETS: [Vec2; 4] = [
    Vec2::new(-0.25, -0.25),
    Vec2::new(0.25, -0.25),
    Vec2::new(-0.25, 0.25),
    Vec2::new(0.25, 0.25),
];

#[derive(Debug, Clone, Copy)]
pub struct Scene {
    pub camera: Vec3,
    pub sphere: Sphere,
    pub background_top: Color,
    pub background_bottom: Color,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            camera: CAMERA_POSITION,
            sphere: Sphere::new(SPHERE_CENTER, SPHERE_RADIUS),
            background_top: BACKGROUND_TOP,
            background_bottom: BACKGROUND_BOTTOM,
        }
    }
}

impl Scene {
    /// Vertical gradient for row `y`, `t = y / height`
    pub fn background(&self, y: u32, height: u32) -> Color {
        let t = y as f32 / height as f32;
        self.background_top.lerp(&self.background_bottom, t)
    }

    /// Normal-visualization color if the ray hits the sphere
    pub fn hit_color(&self, ray: &Ray) -> Option<Color> {
        self.sphere.intersect(ray).map(|hit| {
            let n = hit.normal;
            let to_unit = |c: f32| remap(c, (-1.0, 1.0), (0.0, 1.0));
            Color::rgb(to_unit(n.x), to_unit(n.y), to_unit(n.z))
        })
    }
}

/// Camera-space viewport derived from the frame size.
///
/// The longer screen side spans 1.0, the shorter `short / long`, so pixels
/// stay square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub size: Vec2,
    pub pixel_size: Vec2,
    pub resolution: Resolution,
}

impl Viewport {
    pub fn new(resolution: Resolution) -> Self {
        let w = resolution.width() as f32;
        let h = resolution.height() as f32;
        let size = if w >= h {
            Vec2::new(1.0, h / w)
        } else {
            Vec2::new(w / h, 1.0)
        };
        Self {
            size,
            pixel_size: size / Vec2::new(w, h),
            resolution,
        }
    }

    /// Screen-space point for a position in pixel coordinates
    pub fn uv(&self, px: f32, py: f32) -> Vec2 {
        Vec2::new(px, py) * self.pixel_size - self.size * 0.5
    }
}

/// Everything a worker needs to shade pixels of one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameShader {
    pub scene: Scene,
    pub viewport: Viewport,
    pub supersample: bool,
}

impl FrameShader {
    pub fn new(scene: Scene, viewport: Viewport, supersample: bool) -> Self {
        Self {
            scene,
            viewport,
            supersample,
        }
    }

    fn primary_ray(&self, px: f32, py: f32) -> Ray {
        let uv = self.viewport.uv(px, py);
        let target = Vec3::new(uv.x, uv.y, 0.0);
        Ray::new(self.scene.camera, target - self.scene.camera)
    }

    /// Shade pixel `(x, y)` and pack it as ARGB32
    pub fn shade_pixel(&self, x: u32, y: u32) -> u32 {
        let background = self.scene.background(y, self.viewport.resolution.height());
        let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

        if !self.supersample {
            let ray = self.primary_ray(center.x, center.y);
            return self.scene.hit_color(&ray).unwrap_or(background).to_argb32();
        }

        let mut sum = Color::default();
        let mut hits = 0u32;
        for offset in SUPERSAMPLE_OFFSETS {
            let p = center + offset;
            if let Some(c) = self.scene.hit_color(&self.primary_ray(p.x, p.y)) {
                sum.a += c.a;
                sum.r += c.r;
                sum.g += c.g;
                sum.b += c.b;
                hits += 1;
            }
        }

        match hits {
            0 => background.to_argb32(),
            n => {
                let inv = 1.0 / n as f32;
                let average = Color {
                    a: sum.a * inv,
                    r: sum.r * inv,
                    g: sum.g * inv,
                    b: sum.b * inv,
                };
                if n as usize == SUPERSAMPLE_OFFSETS.len() {
                    return average.to_argb32();
                }
                let coverage = n as f32 / SUPERSAMPLE_OFFSETS.len() as f32;
                let blended = background.to_hsv().lerp(&average.to_hsv(), coverage);
                Color::from_hsv(&blended).to_argb32()
            }
        }
    }
}
