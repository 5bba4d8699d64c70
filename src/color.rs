//! Float colors, ARGB32 packing and HSV blending

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    (1.0 - t) * a + t * b
}

/// Map `value` from `input` range onto `output` range
#[inline]
pub fn remap(value: f32, input: (f32, f32), output: (f32, f32)) -> f32 {
    debug_assert!(input.1 - input.0 > 0.0, "invalid or swapped input range");
    debug_assert!(output.1 - output.0 > 0.0, "invalid or swapped output range");
    output.0 + (value - input.0) * (output.1 - output.0) / (input.1 - input.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    /// Hue in degrees, [0, 360)
    pub h: f32,
    pub s: f32,
    pub v: f32,
    pub a: f32,
}

impl Hsv {
    pub fn lerp(&self, other: &Hsv, t: f32) -> Hsv {
        Hsv {
            h: lerp(t, self.h, other.h),
            s: lerp(t, self.s, other.s),
            v: lerp(t, self.v, other.v),
            a: lerp(t, self.a, other.a),
        }
    }
}

/// Color with float channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { a: 1.0, r, g, b }
    }

    pub fn from_argb32(argb: u32) -> Self {
        let channel = |shift: u32| ((argb >> shift) & 0xff) as f32 / 255.0;
        Self {
            a: channel(24),
            r: channel(16),
            g: channel(8),
            b: channel(0),
        }
    }

    /// Pack as 0xAARRGGBB, rounding each channel to the nearest 8-bit value
    pub fn to_argb32(&self) -> u32 {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (quantize(self.a) << 24) | (quantize(self.r) << 16) | (quantize(self.g) << 8) | quantize(self.b)
    }

    /// Per-channel RGB interpolation (alpha included)
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        Color {
            a: lerp(t, self.a, other.a),
            r: lerp(t, self.r, other.r),
            g: lerp(t, self.g, other.g),
            b: lerp(t, self.b, other.b),
        }
    }

    /// `[r, g, b, a]`, the layout the compute shader reads
    pub fn to_rgba_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hsv(&self) -> Hsv {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let diff = max - min;

        if diff == 0.0 {
            return Hsv { h: 0.0, s: 0.0, v: max, a: self.a };
        }

        let mut h = if max == self.r {
            (self.g - self.b) / diff
        } else if max == self.g {
            (self.b - self.r) / diff + 2.0
        } else {
            (self.r - self.g) / diff + 4.0
        };

        h *= 60.0;
        if h < 0.0 {
            h += 360.0;
        }
        // A tiny negative hue rounds up to exactly 360 when wrapped
        if h >= 360.0 {
            h -= 360.0;
        }

        Hsv { h, s: diff / max, v: max, a: self.a }
    }

    pub fn from_hsv(hsv: &Hsv) -> Self {
        if hsv.s == 0.0 {
            return Self { a: hsv.a, r: hsv.v, g: hsv.v, b: hsv.v };
        }

        let h = hsv.h / 60.0;
        let sector = h.floor();
        let f = h - sector;

        let p = hsv.v * (1.0 - hsv.s);
        let q = hsv.v * (1.0 - hsv.s * f);
        let t = hsv.v * (1.0 - hsv.s * (1.0 - f));

        let (r, g, b) = match sector as u32 % 6 {
            0 => (hsv.v, t, p),
            1 => (q, hsv.v, p),
            2 => (p, hsv.v, t),
            3 => (p, q, hsv.v),
            4 => (t, p, hsv.v),
            _ => (hsv.v, p, q),
        };

        Self { a: hsv.a, r, g, b }
    }
}
