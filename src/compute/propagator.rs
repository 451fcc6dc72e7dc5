//! CPU Propagator - reference stepper for double-buffered stencil updates.
//!
//! Runs the same ping-pong schedule as the GPU engine, with the per-pixel
//! update given as a Rust closure. Used to cross-check GPU results in tests
//! and benchmarks.

use rayon::prelude::*;

use super::pingpong::{FieldSlot, PingPong};
use super::pixels::{CHANNELS, Pixel, PixelBuffer, PixelError};

/// CPU stepper over two equally sized pixel buffers.
pub struct CpuPropagator<F> {
    fields: [PixelBuffer; 2],
    pingpong: PingPong,
    transition: F,
}

impl<F> CpuPropagator<F>
where
    F: Fn(&PixelBuffer, usize, usize) -> Pixel + Sync,
{
    /// Start from `initial` in buffer A. Buffer B starts zeroed.
    pub fn new(initial: PixelBuffer, transition: F) -> Self {
        let scratch = PixelBuffer::new(initial.width(), initial.height());
        Self {
            fields: [initial, scratch],
            pingpong: PingPong::new(),
            transition,
        }
    }

    /// Run `iterations` updates. Each one reads the current buffer, writes
    /// the other, then swaps.
    pub fn step(&mut self, iterations: u64) {
        let width = self.fields[0].width();
        if width == 0 {
            self.pingpong.advance_by(iterations);
            return;
        }
        for _ in 0..iterations {
            let pass = self.pingpong.pass();
            let [a, b] = &mut self.fields;
            let (source, target) = match pass.source {
                FieldSlot::A => (&*a, b),
                FieldSlot::B => (&*b, a),
            };
            let transition = &self.transition;
            target
                .as_mut_slice()
                .par_chunks_mut(width * CHANNELS)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, out) in row.chunks_exact_mut(CHANNELS).enumerate() {
                        out.copy_from_slice(&transition(source, x, y));
                    }
                });
            self.pingpong.advance();
        }
    }

    /// Newest generation.
    pub fn current(&self) -> &PixelBuffer {
        &self.fields[self.pingpong.current().index()]
    }

    pub fn current_slot(&self) -> FieldSlot {
        self.pingpong.current()
    }

    pub fn generation(&self) -> u64 {
        self.pingpong.generation()
    }

    /// Replace the current buffer's contents.
    pub fn seed(&mut self, pixels: &PixelBuffer) -> Result<(), PixelError> {
        let current = &mut self.fields[self.pingpong.current().index()];
        if (pixels.width(), pixels.height()) != (current.width(), current.height()) {
            return Err(PixelError::SizeMismatch {
                expected_width: current.width(),
                expected_height: current.height(),
                actual_width: pixels.width(),
                actual_height: pixels.height(),
            });
        }
        current.as_mut_slice().copy_from_slice(pixels.as_slice());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::GrayScottParams;

    fn identity(field: &PixelBuffer, x: usize, y: usize) -> Pixel {
        field.pixel(x, y)
    }

    #[test]
    fn test_identity_preserves_field() {
        let mut seed = PixelBuffer::filled(6, 4, [0.8, 0.0, 0.0, 1.0]);
        seed.rect(2, 1, 2, 2, [0.5, 0.5, 0.0, 0.5]).unwrap();
        let mut cpu = CpuPropagator::new(seed.clone(), identity);

        cpu.step(3);
        assert_eq!(cpu.generation(), 3);
        assert_eq!(cpu.current_slot(), FieldSlot::B);
        assert_eq!(cpu.current(), &seed);
    }

    #[test]
    fn test_shift_reads_previous_generation() {
        let mut seed = PixelBuffer::new(4, 1);
        seed.set_pixel(0, 0, [1.0; 4]);
        // Each pixel takes its left neighbour: the marker moves one cell per step.
        let mut cpu = CpuPropagator::new(seed, |f: &PixelBuffer, x, y| {
            f.pixel_wrapped(x as isize - 1, y as isize)
        });

        cpu.step(1);
        assert_eq!(cpu.current().pixel(1, 0), [1.0; 4]);
        assert_eq!(cpu.current().pixel(0, 0), [0.0; 4]);
        cpu.step(4);
        assert_eq!(cpu.current().pixel(1, 0), [1.0; 4]);
    }

    #[test]
    fn test_seed_size_mismatch() {
        let mut cpu = CpuPropagator::new(PixelBuffer::new(4, 4), identity);
        let err = cpu.seed(&PixelBuffer::new(3, 4)).unwrap_err();
        assert!(matches!(err, PixelError::SizeMismatch { actual_width: 3, .. }));
    }

    #[test]
    fn test_gray_scott_spot_stays_bounded() {
        let mut seed = PixelBuffer::filled(32, 32, [1.0, 0.0, 0.0, 1.0]);
        seed.rect(14, 14, 4, 4, [0.5, 0.5, 0.0, 1.0]).unwrap();
        let params = GrayScottParams::default();
        let mut cpu = CpuPropagator::new(seed, move |f: &PixelBuffer, x, y| {
            params.transition(f, x, y)
        });

        cpu.step(50);
        let b = cpu.current().channel_stats(1);
        assert!(b.min >= 0.0 && b.max <= 1.0);
        assert!(b.max > 0.0, "chemical B died out");
    }
}
