//! Rays and the sphere primitive

use glam::Vec3;

/// A ray in 3D space with a normalized direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Hit record. `t` stays at +inf until an intersection overwrites it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub t: f32,
}

impl Default for RayHit {
    fn default() -> Self {
        Self {
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            t: f32::INFINITY,
        }
    }
}

impl RayHit {
    pub fn is_hit(&self) -> bool {
        self.t.is_finite()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Vec3,
    radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.abs(),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Nearest intersection in front of the ray origin, if any
    pub fn intersect(&self, ray: &Ray) -> Option<RayHit> {
        let oc = ray.origin() - self.center;
        let half_b = oc.dot(ray.direction());
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = half_b * half_b - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_d = discriminant.sqrt();
        let mut t = -half_b - sqrt_d;
        if t < 0.0 {
            t = -half_b + sqrt_d;
            if t < 0.0 {
                return None;
            }
        }

        let point = ray.at(t);
        let normal = if self.radius > 0.0 {
            (point - self.center) / self.radius
        } else {
            -ray.direction()
        };

        Some(RayHit { point, normal, t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_direction_is_normalized() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0));
        assert!((ray.direction().length() - 1.0).abs() < 1e-6);
        assert!((ray.at(5.0).x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_hit_default_is_miss() {
        let hit = RayHit::default();
        assert!(hit.t.is_infinite());
        assert!(!hit.is_hit());
    }

    #[test]
    fn test_hit_towards_center() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -2.0), 1.0);
        let origin = Vec3::new(0.0, 0.0, 1.0);
        let ray = Ray::new(origin, sphere.center - origin);

        let hit = sphere.intersect(&ray).expect("ray through the center must hit");
        let expected = origin.distance(sphere.center) - sphere.radius();
        assert!((hit.t - expected).abs() < 1e-5);
        assert!((hit.normal - Vec3::Z).length() < 1e-5);
        assert!(hit.is_hit());
    }

    #[test]
    fn test_off_axis_hit_distance() {
        let sphere = Sphere::new(Vec3::new(4.0, 3.0, 0.0), 2.0);
        let ray = Ray::new(Vec3::ZERO, sphere.center);
        let hit = sphere.intersect(&ray).unwrap();
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!((hit.normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_miss_when_pointing_away() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -2.0), 1.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(sphere.intersect(&ray).is_none());
    }

    #[test]
    fn test_miss_when_passing_beside() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -2.0), 1.0);
        let ray = Ray::new(Vec3::new(2.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(sphere.intersect(&ray).is_none());
    }

    #[test]
    fn test_origin_inside_sphere_uses_far_root() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let hit = sphere.intersect(&ray).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_negative_radius_is_absolute() {
        let sphere = Sphere::new(Vec3::ZERO, -2.5);
        assert_eq!(sphere.radius(), 2.5);
    }
}
