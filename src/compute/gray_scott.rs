//! Gray-Scott reaction-diffusion model.
//!
//! Channel 0 holds the concentration of chemical A, channel 1 of chemical B.
//! Channels 2 and 3 are carried through unchanged.

use serde::{Deserialize, Serialize};

use super::pixels::{Pixel, PixelBuffer};
use super::uniforms::{ParameterSet, UniformValue};

/// Laplacian weight of the centre cell.
pub const CENTER_WEIGHT: f32 = -1.0;
/// Laplacian weight of each edge-adjacent neighbour.
pub const ADJACENT_WEIGHT: f32 = 0.2;
/// Laplacian weight of each diagonal neighbour.
pub const DIAGONAL_WEIGHT: f32 = 0.05;

/// Model parameters. Field names match the uniform names used by the
/// bundled update shader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrayScottParams {
    #[serde(rename = "Da")]
    pub da: f32,
    #[serde(rename = "Db")]
    pub db: f32,
    #[serde(rename = "Feed")]
    pub feed: f32,
    #[serde(rename = "Kill")]
    pub kill: f32,
    #[serde(default = "default_dt")]
    pub dt: f32,
}

fn default_dt() -> f32 {
    1.0
}

impl Default for GrayScottParams {
    fn default() -> Self {
        Self {
            da: 1.0,
            db: 0.5,
            feed: 0.055,
            kill: 0.062,
            dt: default_dt(),
        }
    }
}

impl GrayScottParams {
    /// Uniform values for the bundled update program.
    pub fn to_parameters(&self) -> ParameterSet {
        ParameterSet::from([
            ("Da".to_string(), UniformValue::Scalar(self.da)),
            ("Db".to_string(), UniformValue::Scalar(self.db)),
            ("Feed".to_string(), UniformValue::Scalar(self.feed)),
            ("Kill".to_string(), UniformValue::Scalar(self.kill)),
            ("dt".to_string(), UniformValue::Scalar(self.dt)),
        ])
    }

    /// Read back any Gray-Scott entries present in `params`, keeping
    /// defaults for the rest.
    pub fn from_parameters(params: &ParameterSet) -> Self {
        let mut out = Self::default();
        let scalar = |name: &str| match params.get(name) {
            Some(UniformValue::Scalar(v)) => Some(*v),
            _ => None,
        };
        if let Some(v) = scalar("Da") {
            out.da = v;
        }
        if let Some(v) = scalar("Db") {
            out.db = v;
        }
        if let Some(v) = scalar("Feed") {
            out.feed = v;
        }
        if let Some(v) = scalar("Kill") {
            out.kill = v;
        }
        if let Some(v) = scalar("dt") {
            out.dt = v;
        }
        out
    }

    /// Compute the next value of pixel `(x, y)` from `field`.
    ///
    /// Neighbours wrap around both edges.
    pub fn transition(&self, field: &PixelBuffer, x: usize, y: usize) -> Pixel {
        let [a, b, z, w] = field.pixel(x, y);
        let (lap_a, lap_b) = laplacian(field, x, y);
        let reaction = a * b * b;
        let next_a = a + (self.da * lap_a - reaction + self.feed * (1.0 - a)) * self.dt;
        let next_b = b + (self.db * lap_b + reaction - (self.kill + self.feed) * b) * self.dt;
        [next_a.clamp(0.0, 1.0), next_b.clamp(0.0, 1.0), z, w]
    }
}

/// 3x3 Laplacian of channels A and B at `(x, y)`.
pub fn laplacian(field: &PixelBuffer, x: usize, y: usize) -> (f32, f32) {
    let (x, y) = (x as isize, y as isize);
    let mut lap_a = 0.0;
    let mut lap_b = 0.0;
    for dy in -1..=1isize {
        for dx in -1..=1isize {
            let weight = match (dx, dy) {
                (0, 0) => CENTER_WEIGHT,
                (0, _) | (_, 0) => ADJACENT_WEIGHT,
                _ => DIAGONAL_WEIGHT,
            };
            let p = field.pixel_wrapped(x + dx, y + dy);
            lap_a += weight * p[0];
            lap_b += weight * p[1];
        }
    }
    (lap_a, lap_b)
}
