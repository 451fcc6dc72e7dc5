//! Configuration types for reaction-diffusion runs.

use serde::{Deserialize, Serialize};

use crate::compute::{GrayScottParams, ParameterSet, UniformValue};

fn default_iterations_per_frame() -> u64 {
    10
}

fn default_frames() -> u64 {
    600
}

fn default_frame_rate() -> f64 {
    60.0
}

fn default_resolution_uniform() -> Option<String> {
    Some("res".to_string())
}

fn default_parameters() -> ParameterSet {
    GrayScottParams::default().to_parameters()
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Field width in pixels.
    pub width: u32,
    /// Field height in pixels.
    pub height: u32,
    /// Update iterations run per displayed frame.
    #[serde(default = "default_iterations_per_frame")]
    pub iterations_per_frame: u64,
    /// Frames to run before the binary exits.
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Target frames per second; 0 runs unthrottled.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Uniform set to `[width, height]` on the update program, if declared.
    #[serde(default = "default_resolution_uniform")]
    pub resolution_uniform: Option<String>,
    /// Initial update-program parameters.
    #[serde(default = "default_parameters")]
    pub parameters: ParameterSet,
    /// Format of the presentation surface.
    #[serde(default)]
    pub surface_format: SurfaceFormat,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            iterations_per_frame: default_iterations_per_frame(),
            frames: default_frames(),
            frame_rate: default_frame_rate(),
            resolution_uniform: default_resolution_uniform(),
            parameters: default_parameters(),
            surface_format: SurfaceFormat::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if !self.frame_rate.is_finite() || self.frame_rate < 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.frame_rate));
        }
        for (name, value) in &self.parameters {
            let finite = match value {
                UniformValue::Scalar(v) => v.is_finite(),
                UniformValue::Vec2(v) => v.iter().all(|c| c.is_finite()),
                UniformValue::Vec4(v) => v.iter().all(|c| c.is_finite()),
            };
            if !finite {
                return Err(ConfigError::NonFiniteParameter(name.clone()));
            }
        }
        Ok(())
    }

    /// Number of pixels in the field.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Presentation surface format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceFormat {
    /// 8-bit RGBA, linear.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, the usual window swapchain format.
    Bgra8Unorm,
    /// Full-precision float, for exporting raw field values.
    Rgba32Float,
}

impl From<SurfaceFormat> for wgpu::TextureFormat {
    fn from(format: SurfaceFormat) -> Self {
        match format {
            SurfaceFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            SurfaceFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            SurfaceFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            SurfaceFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Field dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Frame rate must be finite and non-negative, got {0}")]
    InvalidFrameRate(f64),
    #[error("Parameter `{0}` is not finite")]
    NonFiniteParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!((config.width, config.height), (512, 512));
        assert_eq!(config.iterations_per_frame, 10);
        assert_eq!(config.resolution_uniform.as_deref(), Some("res"));
        assert_eq!(config.parameters["Feed"], UniformValue::Scalar(0.055));
        config.validate().unwrap();
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"width": 64, "height": 32}"#).unwrap();
        assert_eq!(config.grid_size(), 64 * 32);
        assert_eq!(config.frames, 600);
        assert_eq!(config.surface_format, SurfaceFormat::Rgba8Unorm);
        assert_eq!(config.parameters.len(), 5);
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let config = SimulationConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDimensions)));
    }

    #[test]
    fn test_validate_rejects_bad_rate_and_values() {
        let config = SimulationConfig {
            frame_rate: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFrameRate(_))));

        let mut config = SimulationConfig::default();
        config
            .parameters
            .insert("Kill".to_string(), UniformValue::Scalar(f32::NAN));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFiniteParameter(name)) if name == "Kill"
        ));
    }

    #[test]
    fn test_surface_format_mapping() {
        let format: wgpu::TextureFormat = SurfaceFormat::Bgra8Unorm.into();
        assert_eq!(format, wgpu::TextureFormat::Bgra8Unorm);
        let parsed: SurfaceFormat = serde_json::from_str(r#""rgba32_float""#).unwrap();
        assert_eq!(parsed, SurfaceFormat::Rgba32Float);
    }
}
