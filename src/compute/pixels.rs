//! Host-side RGBA32F pixel grids used for seeding and readback.
//!
//! Layout is row-major with the origin at the top-left pixel, matching the
//! order in which field textures are uploaded and copied back.

/// One field pixel: four float channels (RGBA repurposed as simulation state).
pub type Pixel = [f32; 4];

/// Number of float channels per pixel.
pub const CHANNELS: usize = 4;

/// Errors raised when a pixel region or buffer does not fit its target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PixelError {
    #[error(
        "Region at ({x}, {y}) of size {width}x{height} exceeds {bounds_width}x{bounds_height} bounds"
    )]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        bounds_width: usize,
        bounds_height: usize,
    },

    #[error("Pixel buffer is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Pixel data holds {len} floats, expected {width}x{height}x4")]
    InvalidLength {
        len: usize,
        width: usize,
        height: usize,
    },
}

/// Check that the region `(x, y, width, height)` lies inside a
/// `bounds_width` x `bounds_height` grid.
pub fn check_region(
    bounds_width: usize,
    bounds_height: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Result<(), PixelError> {
    let fits_x = x.checked_add(width).is_some_and(|end| end <= bounds_width);
    let fits_y = y.checked_add(height).is_some_and(|end| end <= bounds_height);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(PixelError::OutOfBounds {
            x,
            y,
            width,
            height,
            bounds_width,
            bounds_height,
        })
    }
}

/// A width x height grid of RGBA32F pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl PixelBuffer {
    /// Create a buffer with every channel set to zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0.0; CHANNELS])
    }

    /// Create a buffer with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: Pixel) -> Self {
        let mut data = Vec::with_capacity(width * height * CHANNELS);
        for _ in 0..width * height {
            data.extend_from_slice(&value);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap raw row-major RGBA floats.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Result<Self, PixelError> {
        if data.len() != width * height * CHANNELS {
            return Err(PixelError::InvalidLength {
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major channel data.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw channel data. The length is fixed.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    /// Data as bytes, ready for a texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * CHANNELS
    }

    /// Pixel at `(x, y)`. Panics if out of range, like slice indexing.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Pixel {
        let i = self.index(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Pixel at `(x, y)` with toroidal wrap-around on both axes.
    #[inline]
    pub fn pixel_wrapped(&self, x: isize, y: isize) -> Pixel {
        let x = x.rem_euclid(self.width as isize) as usize;
        let y = y.rem_euclid(self.height as isize) as usize;
        self.pixel(x, y)
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: Pixel) {
        let i = self.index(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&value);
    }

    /// Iterate over pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|c| [c[0], c[1], c[2], c[3]])
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: Pixel) {
        for chunk in self.data.chunks_exact_mut(CHANNELS) {
            chunk.copy_from_slice(&value);
        }
    }

    /// Overwrite an axis-aligned rectangle with `value`.
    ///
    /// A rectangle reaching past either edge is rejected with
    /// [`PixelError::OutOfBounds`] and nothing is written.
    pub fn rect(
        &mut self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        value: Pixel,
    ) -> Result<(), PixelError> {
        check_region(self.width, self.height, x, y, width, height)?;
        for row in y..y + height {
            for col in x..x + width {
                self.set_pixel(col, row, value);
            }
        }
        Ok(())
    }

    /// Copy out a rectangular region as a new buffer.
    pub fn region(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer, PixelError> {
        check_region(self.width, self.height, x, y, width, height)?;
        let mut data = Vec::with_capacity(width * height * CHANNELS);
        for row in y..y + height {
            let start = self.index(x, row);
            data.extend_from_slice(&self.data[start..start + width * CHANNELS]);
        }
        Ok(PixelBuffer {
            width,
            height,
            data,
        })
    }

    /// Per-channel min/max/mean over the whole buffer.
    pub fn channel_stats(&self, channel: usize) -> ChannelStats {
        let mut stats = ChannelStats {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean: 0.0,
        };
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for px in self.pixels() {
            let v = px[channel];
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            sum += v as f64;
            count += 1;
        }
        if count > 0 {
            stats.mean = (sum / count as f64) as f32;
        } else {
            stats.min = 0.0;
            stats.max = 0.0;
        }
        stats
    }
}

/// Summary statistics for one channel of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_filled_every_pixel() {
        let buf = PixelBuffer::filled(3, 2, [0.8, 0.0, 0.0, 1.0]);
        assert_eq!(buf.as_slice().len(), 3 * 2 * CHANNELS);
        assert!(buf.pixels().all(|p| p == [0.8, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_fill_overwrites_everything() {
        let mut buf = PixelBuffer::filled(3, 3, [0.8, 0.0, 0.0, 1.0]);
        buf.rect(1, 1, 1, 1, [0.5, 0.5, 0.0, 0.5]).unwrap();
        buf.fill([0.25, 0.5, 0.75, 1.0]);
        assert!(buf.pixels().all(|p| p == [0.25, 0.5, 0.75, 1.0]));
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.height(), 3);
    }

    #[test]
    fn test_rect_overwrites_only_region() {
        let mut buf = PixelBuffer::filled(4, 4, [0.8, 0.0, 0.0, 1.0]);
        buf.rect(1, 1, 2, 2, [0.5, 0.5, 0.0, 0.5]).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside {
                    [0.5, 0.5, 0.0, 0.5]
                } else {
                    [0.8, 0.0, 0.0, 1.0]
                };
                assert_eq!(buf.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_rect_out_of_bounds_leaves_buffer_untouched() {
        let mut buf = PixelBuffer::filled(8, 8, [1.0, 0.0, 0.0, 1.0]);
        let before = buf.clone();

        let err = buf.rect(6, 0, 3, 1, [0.0; 4]).unwrap_err();
        assert!(matches!(err, PixelError::OutOfBounds { x: 6, width: 3, .. }));
        assert_eq!(buf, before);

        let err = buf.rect(0, 7, 1, 2, [0.0; 4]).unwrap_err();
        assert!(matches!(err, PixelError::OutOfBounds { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn test_rect_overflowing_coordinates_rejected() {
        let mut buf = PixelBuffer::new(4, 4);
        assert!(buf.rect(usize::MAX, 0, 2, 1, [1.0; 4]).is_err());
    }

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0.0; 15]).unwrap_err();
        assert_eq!(
            err,
            PixelError::InvalidLength {
                len: 15,
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn test_region_extracts_rows() {
        let mut buf = PixelBuffer::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                buf.set_pixel(x, y, [x as f32, y as f32, 0.0, 1.0]);
            }
        }
        let sub = buf.region(1, 1, 2, 2).unwrap();
        assert_eq!(sub.width(), 2);
        assert_eq!(sub.pixel(0, 0), [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(sub.pixel(1, 1), [2.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pixel_wrapped() {
        let mut buf = PixelBuffer::new(3, 3);
        buf.set_pixel(2, 0, [7.0; 4]);
        assert_eq!(buf.pixel_wrapped(-1, 3), [7.0; 4]);
    }

    #[test]
    fn test_channel_stats() {
        let mut buf = PixelBuffer::filled(2, 2, [1.0, 0.0, 0.0, 0.0]);
        buf.set_pixel(0, 0, [0.0, 0.0, 0.0, 0.0]);
        let stats = buf.channel_stats(0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 1.0);
        assert!((stats.mean - 0.75).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_rect_rejects_exactly_when_outside(
            w in 1usize..16, h in 1usize..16,
            x in 0usize..20, y in 0usize..20,
            rw in 0usize..20, rh in 0usize..20,
        ) {
            let mut buf = PixelBuffer::new(w, h);
            let before = buf.clone();
            let result = buf.rect(x, y, rw, rh, [1.0; 4]);
            if x + rw > w || y + rh > h {
                let rejected = matches!(result, Err(PixelError::OutOfBounds { .. }));
                prop_assert!(rejected);
                prop_assert_eq!(buf, before);
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }
}
