//! Color tolerance bound used by the magic wand.
//!
//! Colors are compared premultiplied, channel by channel. A pixel matches
//! when every channel lies inside the reference channel widened by the
//! tolerance. 8-bit buffers are tested against precomputed integer ranges so
//! the hot loop never converts pixels to floats.

use serde::{Deserialize, Serialize};

/// Half of one 8-bit step, so tolerance 0 still accepts the exact 8-bit value.
const HALF_STEP: f64 = 0.5 / 255.0;

/// Absorbs f32 rounding of the reference when bounds land on whole steps.
const SNAP: f64 = 1e-4;

/// Premultiplied RGBA color with channels in 0.0-1.0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorF {
    pub const TRANSPARENT: ColorF = ColorF { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// From premultiplied 8-bit channels.
    pub fn from_premultiplied_u8(rgba: [u8; 4]) -> Self {
        Self::new(
            rgba[0].to_unit(),
            rgba[1].to_unit(),
            rgba[2].to_unit(),
            rgba[3].to_unit(),
        )
    }

    /// From raw channels of any supported representation (premultiplied).
    pub fn from_channels<C: Channel>(pixel: &[C]) -> Self {
        Self::new(
            pixel[0].to_unit(),
            pixel[1].to_unit(),
            pixel[2].to_unit(),
            pixel[3].to_unit(),
        )
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0.0
    }

    fn channels(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A stored channel type that can be tested against a [`ColorBounds`]
/// without decoding the whole pixel.
pub trait Channel: Copy + Send + Sync + 'static {
    /// Test the first four channels of `pixel` against `bounds`.
    fn within(bounds: &ColorBounds, pixel: &[Self]) -> bool;

    /// Normalized value, 0.0-1.0.
    fn to_unit(self) -> f32;
}

impl Channel for u8 {
    #[inline]
    fn within(bounds: &ColorBounds, pixel: &[u8]) -> bool {
        (0..4).all(|c| {
            let v = pixel[c] as i32;
            v >= bounds.lower_u8[c] && v <= bounds.upper_u8[c]
        })
    }

    #[inline]
    fn to_unit(self) -> f32 {
        self as f32 / 255.0
    }
}

impl Channel for f32 {
    #[inline]
    fn within(bounds: &ColorBounds, pixel: &[f32]) -> bool {
        (0..4).all(|c| pixel[c] >= bounds.lower[c] && pixel[c] <= bounds.upper[c])
    }

    #[inline]
    fn to_unit(self) -> f32 {
        self
    }
}

/// Inclusive per-channel ranges around a reference color.
///
/// Float ranges are exact; the 8-bit ranges are widened by half a step
/// before rounding inward.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBounds {
    reference: ColorF,
    lower: [f32; 4],
    upper: [f32; 4],
    lower_u8: [i32; 4],
    upper_u8: [i32; 4],
}

impl ColorBounds {
    /// Build bounds around `reference`. `tolerance` is clamped to 0.0-1.0.
    pub fn new(reference: ColorF, tolerance: f64) -> Self {
        let tolerance = if tolerance.is_nan() { 0.0 } else { tolerance.clamp(0.0, 1.0) };
        let mut lower = [0.0f32; 4];
        let mut upper = [0.0f32; 4];
        let mut lower_u8 = [0i32; 4];
        let mut upper_u8 = [0i32; 4];

        for (c, value) in reference.channels().into_iter().enumerate() {
            let lo = value as f64 - tolerance;
            let hi = value as f64 + tolerance;
            lower[c] = lo as f32;
            upper[c] = hi as f32;
            lower_u8[c] = ((lo - HALF_STEP) * 255.0 - SNAP).ceil() as i32;
            upper_u8[c] = ((hi + HALF_STEP) * 255.0 + SNAP).floor() as i32;
        }

        Self {
            reference,
            lower,
            upper,
            lower_u8,
            upper_u8,
        }
    }

    pub fn reference(&self) -> ColorF {
        self.reference
    }

    /// Test an already decoded color against the float ranges.
    pub fn is_match(&self, color: ColorF) -> bool {
        let channels = color.channels();
        (0..4).all(|c| channels[c] >= self.lower[c] && channels[c] <= self.upper[c])
    }

    /// Test the first four channels of a raw pixel slice.
    #[inline]
    pub fn is_match_raw<C: Channel>(&self, pixel: &[C]) -> bool {
        C::within(self, pixel)
    }

    /// Test pixel number `offset` of a packed RGBA buffer.
    #[inline]
    pub fn is_match_at<C: Channel>(&self, buffer: &[C], offset: usize) -> bool {
        let start = offset * 4;
        C::within(self, &buffer[start..start + 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tolerance_exact_u8() {
        let bounds = ColorBounds::new(ColorF::from_premultiplied_u8([200, 10, 0, 255]), 0.0);
        assert!(bounds.is_match_raw(&[200u8, 10, 0, 255]));
        assert!(!bounds.is_match_raw(&[201u8, 10, 0, 255]));
        assert!(!bounds.is_match_raw(&[200u8, 9, 0, 255]));
        assert!(!bounds.is_match_raw(&[200u8, 10, 0, 254]));
    }

    #[test]
    fn test_tolerance_widens_every_channel() {
        // 0.1 * 255 = 25.5 steps
        let bounds = ColorBounds::new(ColorF::from_premultiplied_u8([100, 100, 100, 255]), 0.1);
        assert!(bounds.is_match_raw(&[125u8, 75, 100, 255]));
        assert!(!bounds.is_match_raw(&[127u8, 100, 100, 255]));
        assert!(!bounds.is_match_raw(&[100u8, 73, 100, 255]));
    }

    #[test]
    fn test_decoded_uses_exact_ranges() {
        let bounds = ColorBounds::new(ColorF::new(0.5, 0.25, 0.0, 1.0), 0.0);
        assert!(bounds.is_match(ColorF::new(0.5, 0.25, 0.0, 1.0)));
        assert!(!bounds.is_match(ColorF::new(0.501, 0.25, 0.0, 1.0)));
    }

    #[test]
    fn test_f32_channels() {
        let bounds = ColorBounds::new(ColorF::new(0.5, 0.25, 0.0, 1.0), 0.0);
        assert!(bounds.is_match_raw(&[0.5f32, 0.25, 0.0, 1.0]));
        assert!(!bounds.is_match_raw(&[0.51f32, 0.25, 0.0, 1.0]));
    }

    #[test]
    fn test_f32_zero_tolerance_is_exact() {
        // well inside half an 8-bit step, still rejected for float buffers
        let bounds = ColorBounds::new(ColorF::new(0.5, 0.25, 0.0, 1.0), 0.0);
        assert!(!bounds.is_match_raw(&[0.5005f32, 0.25, 0.0, 1.0]));
        assert!(!bounds.is_match_raw(&[0.5f32, 0.249, 0.0, 1.0]));
        let loose = ColorBounds::new(ColorF::new(0.5, 0.25, 0.0, 1.0), 0.01);
        assert!(loose.is_match_raw(&[0.509f32, 0.241, 0.0, 1.0]));
        assert!(!loose.is_match_raw(&[0.512f32, 0.25, 0.0, 1.0]));
    }

    #[test]
    fn test_transparent_reference() {
        let bounds = ColorBounds::new(ColorF::TRANSPARENT, 0.0);
        assert!(bounds.is_match(ColorF::TRANSPARENT));
        assert!(!bounds.is_match_raw(&[0u8, 0, 0, 1]));
    }

    #[test]
    fn test_tolerance_is_clamped() {
        let bounds = ColorBounds::new(ColorF::TRANSPARENT, 5.0);
        assert!(bounds.is_match_raw(&[255u8, 255, 255, 255]));
        let bounds = ColorBounds::new(ColorF::from_premultiplied_u8([9, 9, 9, 9]), -1.0);
        assert!(!bounds.is_match_raw(&[10u8, 9, 9, 9]));
    }

    #[test]
    fn test_is_match_at_offsets() {
        let buffer: Vec<u8> = vec![0, 0, 0, 0, 255, 0, 0, 255];
        let bounds = ColorBounds::new(ColorF::from_premultiplied_u8([255, 0, 0, 255]), 0.0);
        assert!(!bounds.is_match_at(&buffer, 0));
        assert!(bounds.is_match_at(&buffer, 1));
    }
}
