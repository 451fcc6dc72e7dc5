//! Frame recorder: appends readback frames to an archive file.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{
    ArchiveFlags, ArchiveHeader, CompressionType, FrameFormat, FrameIndex, compress_lz4,
    encode_field,
};
use crate::compute::PixelBuffer;
use crate::schema::SimulationConfig;

/// Recording options.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub compression: CompressionType,
    pub format: FrameFormat,
    /// Keep every Nth offered frame (1 = every frame).
    pub frame_skip: u32,
    /// Maximum frames to store (0 = unlimited).
    pub max_frames: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            format: FrameFormat::Field,
            frame_skip: 1,
            max_frames: 0,
        }
    }
}

/// Writes frames to an archive. The header is rewritten and the index table
/// appended by [`FrameRecorder::finalize`]; a recorder dropped without it
/// leaves a file that will not open.
///
/// ```ignore
/// let mut recorder = FrameRecorder::new("run.rdfa", &config, Default::default())?;
/// for _ in 0..600 {
///     sim.step(config.iterations_per_frame)?;
///     recorder.record_field(&sim.readback_field(0, 0, w, h)?)?;
/// }
/// recorder.finalize()?;
/// ```
pub struct FrameRecorder {
    writer: BufWriter<File>,
    header: ArchiveHeader,
    frame_indices: Vec<FrameIndex>,
    config: RecorderConfig,
    frames_written: u64,
    offered: u32,
}

impl FrameRecorder {
    pub fn new<P: AsRef<Path>>(
        path: P,
        sim_config: &SimulationConfig,
        config: RecorderConfig,
    ) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = ArchiveHeader {
            width: sim_config.width,
            height: sim_config.height,
            frame_count: 0,
            frame_rate: sim_config.frame_rate as f32,
            iterations_per_frame: u32::try_from(sim_config.iterations_per_frame)
                .unwrap_or(u32::MAX),
            flags: ArchiveFlags {
                compression: config.compression,
                format: config.format,
            },
        };
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            header,
            frame_indices: Vec::new(),
            config,
            frames_written: 0,
            offered: 0,
        })
    }

    /// Offer a field frame. Returns whether it was stored.
    pub fn record_field(&mut self, field: &PixelBuffer) -> io::Result<bool> {
        if self.header.flags.format != FrameFormat::Field {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Archive stores 8-bit surface frames, not field frames",
            ));
        }
        self.record_bytes(&encode_field(field.as_slice()))
    }

    /// Offer a frame already in the archive's pixel layout, such as surface
    /// readback bytes. Returns whether it was stored.
    pub fn record_bytes(&mut self, frame: &[u8]) -> io::Result<bool> {
        if frame.len() != self.header.frame_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame is {} bytes, archive expects {}",
                    frame.len(),
                    self.header.frame_size()
                ),
            ));
        }

        self.offered += 1;
        if self.offered < self.config.frame_skip {
            return Ok(false);
        }
        self.offered = 0;

        if self.config.max_frames > 0 && self.frames_written >= self.config.max_frames {
            return Ok(false);
        }

        let offset = self.writer.stream_position()?;
        let size = match self.header.flags.compression {
            CompressionType::None => {
                self.writer.write_all(frame)?;
                frame.len()
            }
            CompressionType::Lz4 => {
                let packed = compress_lz4(frame)?;
                self.writer.write_all(&packed)?;
                packed.len()
            }
        };
        self.frame_indices.push(FrameIndex {
            offset,
            size: size as u64,
        });
        self.frames_written += 1;
        Ok(true)
    }

    /// Append the index table and rewrite the header with the final count.
    pub fn finalize(mut self) -> io::Result<RecordingStats> {
        let index_offset = self.writer.stream_position()?;
        for index in &self.frame_indices {
            index.write_to(&mut self.writer)?;
        }
        let total_bytes = self.writer.stream_position()?;

        self.header.frame_count = self.frames_written;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        let payload = index_offset.saturating_sub(ArchiveHeader::SIZE as u64);
        log::debug!(
            "Archive finalized: {} frame(s), {total_bytes} bytes",
            self.frames_written
        );
        Ok(RecordingStats {
            frame_count: self.frames_written,
            total_bytes,
            average_frame_size: payload.checked_div(self.frames_written).unwrap_or(0),
            compression: self.header.flags.compression,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Summary of a finished recording.
#[derive(Debug, Clone)]
pub struct RecordingStats {
    pub frame_count: u64,
    /// Size of the finished file.
    pub total_bytes: u64,
    /// Average stored (post-compression) frame size.
    pub average_frame_size: u64,
    pub compression: CompressionType,
}

impl std::fmt::Display for RecordingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/frame avg ({:?} compression)",
            self.frame_count, self.total_bytes, self.average_frame_size, self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Seed;
    use std::fs;
    use tempfile::tempdir;

    fn test_config() -> SimulationConfig {
        SimulationConfig {
            width: 16,
            height: 16,
            ..Default::default()
        }
    }

    fn test_field() -> PixelBuffer {
        Seed::default().generate(16, 16).unwrap()
    }

    #[test]
    fn test_recorder_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.rdfa");

        let mut recorder =
            FrameRecorder::new(&path, &test_config(), RecorderConfig::default()).unwrap();
        let field = test_field();
        for _ in 0..10 {
            assert!(recorder.record_field(&field).unwrap());
        }

        let stats = recorder.finalize().unwrap();
        assert_eq!(stats.frame_count, 10);
        assert_eq!(stats.average_frame_size, 16 * 16 * 16);

        let expected =
            ArchiveHeader::SIZE as u64 + 10 * (16 * 16 * 16) + 10 * FrameIndex::SIZE as u64;
        assert_eq!(stats.total_bytes, expected);
        assert_eq!(fs::metadata(&path).unwrap().len(), expected);
    }

    #[test]
    fn test_recorder_frame_skip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skip.rdfa");

        let config = RecorderConfig {
            frame_skip: 5,
            ..Default::default()
        };
        let mut recorder = FrameRecorder::new(&path, &test_config(), config).unwrap();

        // Offers 5, 10, 15 and 20 are kept.
        let field = test_field();
        for _ in 0..20 {
            recorder.record_field(&field).unwrap();
        }
        assert_eq!(recorder.finalize().unwrap().frame_count, 4);
    }

    #[test]
    fn test_recorder_max_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("max.rdfa");

        let config = RecorderConfig {
            max_frames: 5,
            ..Default::default()
        };
        let mut recorder = FrameRecorder::new(&path, &test_config(), config).unwrap();
        let field = test_field();
        for _ in 0..100 {
            recorder.record_field(&field).unwrap();
        }
        assert_eq!(recorder.finalize().unwrap().frame_count, 5);
    }

    #[test]
    fn test_recorder_rejects_wrong_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wrong.rdfa");

        let config = RecorderConfig {
            format: FrameFormat::Surface8,
            ..Default::default()
        };
        let mut recorder = FrameRecorder::new(&path, &test_config(), config).unwrap();
        assert!(recorder.record_field(&test_field()).is_err());
        assert!(recorder.record_bytes(&[0u8; 10]).is_err());
        assert!(recorder.record_bytes(&[0u8; 16 * 16 * 4]).unwrap());
        assert_eq!(recorder.frames_written(), 1);
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn test_lz4_needs_feature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lz4.rdfa");

        let config = RecorderConfig {
            compression: CompressionType::Lz4,
            ..Default::default()
        };
        let mut recorder = FrameRecorder::new(&path, &test_config(), config).unwrap();
        let err = recorder.record_field(&test_field()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
