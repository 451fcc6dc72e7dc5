//! Seed types for initializing reaction-diffusion fields.

use serde::{Deserialize, Serialize};

use crate::compute::{Pixel, PixelBuffer, PixelError};

/// Seeding failures are region errors.
pub type SeedError = PixelError;

/// Initial field layout: a uniform fill, then rectangles painted over
/// it in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    /// Value of every pixel before patches are applied.
    pub fill: Pixel,
    /// Rectangular overwrites, applied in order.
    #[serde(default)]
    pub patches: Vec<Patch>,
}

impl Default for Seed {
    /// Mostly A with a small square of B at the centre.
    fn default() -> Self {
        Self {
            fill: [0.8, 0.0, 0.0, 1.0],
            patches: vec![Patch::Centered {
                width: 5,
                height: 5,
                value: [0.5, 0.5, 0.0, 0.5],
            }],
        }
    }
}

/// A rectangle of constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Patch {
    /// Rectangle with its top-left corner at `(x, y)`.
    Rect {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        value: Pixel,
    },
    /// Rectangle with its top-left corner at the field centre
    /// `(width / 2, height / 2)`.
    Centered {
        width: usize,
        height: usize,
        value: Pixel,
    },
}

impl Seed {
    /// The seed used when the field is reset.
    pub fn reset_default() -> Self {
        Self {
            fill: [0.5, 0.0, 0.0, 1.0],
            patches: vec![Patch::Centered {
                width: 5,
                height: 5,
                value: [0.5, 0.5, 0.0, 1.0],
            }],
        }
    }

    /// Build the initial field. A patch reaching past the field edge fails
    /// with `OutOfBounds`.
    pub fn generate(&self, width: usize, height: usize) -> Result<PixelBuffer, SeedError> {
        let mut field = PixelBuffer::filled(width, height, self.fill);
        for patch in &self.patches {
            match *patch {
                Patch::Rect {
                    x,
                    y,
                    width: w,
                    height: h,
                    value,
                } => field.rect(x, y, w, h, value)?,
                Patch::Centered {
                    width: w,
                    height: h,
                    value,
                } => field.rect(width / 2, height / 2, w, h, value)?,
            }
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed_square() {
        let field = Seed::default().generate(16, 16).unwrap();
        assert_eq!(field.pixel(0, 0), [0.8, 0.0, 0.0, 1.0]);
        assert_eq!(field.pixel(8, 8), [0.5, 0.5, 0.0, 0.5]);
        assert_eq!(field.pixel(12, 12), [0.5, 0.5, 0.0, 0.5]);
        assert_eq!(field.pixel(13, 13), [0.8, 0.0, 0.0, 1.0]);
        assert_eq!(field.pixel(7, 8), [0.8, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_reset_seed() {
        let field = Seed::reset_default().generate(512, 512).unwrap();
        assert_eq!(field.pixel(0, 0), [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(field.pixel(256, 256), [0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_patch_out_of_bounds() {
        let seed = Seed {
            fill: [0.0; 4],
            patches: vec![Patch::Rect {
                x: 3,
                y: 0,
                width: 2,
                height: 1,
                value: [1.0; 4],
            }],
        };
        assert!(matches!(
            seed.generate(4, 4),
            Err(PixelError::OutOfBounds { x: 3, width: 2, .. })
        ));
    }

    #[test]
    fn test_centered_too_big_for_small_field() {
        // Centre of 4x4 is (2, 2); a 5x5 square cannot fit.
        assert!(Seed::default().generate(4, 4).is_err());
    }

    #[test]
    fn test_json() {
        let json = r#"{
            "fill": [1.0, 0.0, 0.0, 1.0],
            "patches": [
                {"type": "Rect", "x": 0, "y": 0, "width": 2, "height": 2, "value": [0.0, 1.0, 0.0, 1.0]},
                {"type": "Centered", "width": 1, "height": 1, "value": [0.5, 0.5, 0.5, 0.5]}
            ]
        }"#;
        let seed: Seed = serde_json::from_str(json).unwrap();
        let field = seed.generate(4, 4).unwrap();
        assert_eq!(field.pixel(1, 1), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(field.pixel(2, 2), [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(field.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);
    }
}
