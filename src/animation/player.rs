//! Frame player: reads recorded archives back.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{
    ArchiveHeader, CompressionType, FrameFormat, FrameIndex, decode_field, decompress_lz4,
};
use crate::compute::PixelBuffer;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Field(PixelBuffer),
    /// Raw 8-bit RGBA texels, row-major from the top-left.
    Surface8(Vec<u8>),
}

/// Random-access reader over a finalized archive.
///
/// ```ignore
/// let mut player = FramePlayer::open("run.rdfa")?;
/// for frame in player.frames() {
///     let frame = frame?;
/// }
/// ```
pub struct FramePlayer {
    reader: BufReader<File>,
    header: ArchiveHeader,
    frame_indices: Vec<FrameIndex>,
}

impl FramePlayer {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = ArchiveHeader::read_from(&mut reader)?;

        // The index table sits at the end of the file.
        let index_size = header
            .frame_count
            .checked_mul(FrameIndex::SIZE as u64)
            .ok_or_else(|| corrupt("frame count overflows the index table"))?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        let index_start = file_len
            .checked_sub(index_size)
            .filter(|start| *start >= ArchiveHeader::SIZE as u64)
            .ok_or_else(|| corrupt("file too short for its index table"))?;
        reader.seek(SeekFrom::Start(index_start))?;

        let mut frame_indices = Vec::with_capacity(header.frame_count as usize);
        for _ in 0..header.frame_count {
            let index = FrameIndex::read_from(&mut reader)?;
            if index.offset.saturating_add(index.size) > index_start {
                return Err(corrupt("frame extends into the index table"));
            }
            frame_indices.push(index);
        }

        Ok(Self {
            reader,
            header,
            frame_indices,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn frame_count(&self) -> u64 {
        self.header.frame_count
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.width as usize, self.header.height as usize)
    }

    pub fn format(&self) -> FrameFormat {
        self.header.flags.format
    }

    pub fn frame_rate(&self) -> f32 {
        self.header.frame_rate
    }

    /// Stored bytes of one frame, decompressed.
    pub fn read_bytes(&mut self, frame_index: u64) -> io::Result<Vec<u8>> {
        let Some(index) = self.frame_indices.get(frame_index as usize).copied() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame index {} out of range ({} frames)",
                    frame_index, self.header.frame_count
                ),
            ));
        };

        self.reader.seek(SeekFrom::Start(index.offset))?;
        let mut data = vec![0u8; index.size as usize];
        self.reader.read_exact(&mut data)?;

        let raw = match self.header.flags.compression {
            CompressionType::None => data,
            CompressionType::Lz4 => decompress_lz4(&data)?,
        };
        if raw.len() != self.header.frame_size() {
            return Err(corrupt("frame size does not match the header"));
        }
        Ok(raw)
    }

    pub fn read_frame(&mut self, frame_index: u64) -> io::Result<Frame> {
        let raw = self.read_bytes(frame_index)?;
        match self.header.flags.format {
            FrameFormat::Field => {
                let (width, height) = self.dimensions();
                PixelBuffer::from_raw(width, height, decode_field(&raw)?)
                    .map(Frame::Field)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
            FrameFormat::Surface8 => Ok(Frame::Surface8(raw)),
        }
    }

    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator {
            player: self,
            current: 0,
        }
    }
}

fn corrupt(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("Corrupt RDFA archive: {msg}"))
}

/// Iterator over archive frames in order.
pub struct FrameIterator<'a> {
    player: &'a mut FramePlayer,
    current: u64,
}

impl Iterator for FrameIterator<'_> {
    type Item = io::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.player.frame_count() {
            return None;
        }
        let result = self.player.read_frame(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.player.frame_count() - self.current) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{FrameRecorder, RecorderConfig};
    use crate::schema::{Patch, Seed, SimulationConfig};
    use tempfile::tempdir;

    fn test_config() -> SimulationConfig {
        SimulationConfig {
            width: 16,
            height: 8,
            frame_rate: 30.0,
            iterations_per_frame: 4,
            ..Default::default()
        }
    }

    fn numbered_fields(count: usize) -> Vec<PixelBuffer> {
        let seed = Seed {
            fill: [0.8, 0.0, 0.0, 1.0],
            patches: vec![Patch::Centered {
                width: 4,
                height: 3,
                value: [0.5, 0.5, 0.0, 0.5],
            }],
        };
        let base = seed.generate(16, 8).unwrap();
        (0..count)
            .map(|i| {
                let mut field = base.clone();
                field.set_pixel(0, 0, [i as f32, 0.0, 0.0, 1.0]);
                field
            })
            .collect()
    }

    fn record(path: &Path, config: RecorderConfig, fields: &[PixelBuffer]) {
        let mut recorder = FrameRecorder::new(path, &test_config(), config).unwrap();
        for field in fields {
            recorder.record_field(field).unwrap();
        }
        recorder.finalize().unwrap();
    }

    #[test]
    fn test_player_reads_fields_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fields.rdfa");
        let fields = numbered_fields(5);
        record(&path, RecorderConfig::default(), &fields);

        let mut player = FramePlayer::open(&path).unwrap();
        assert_eq!(player.frame_count(), 5);
        assert_eq!(player.dimensions(), (16, 8));
        assert_eq!(player.format(), FrameFormat::Field);
        assert_eq!(player.frame_rate(), 30.0);
        assert_eq!(player.header().iterations_per_frame, 4);

        // Random access, last frame first.
        assert_eq!(player.read_frame(4).unwrap(), Frame::Field(fields[4].clone()));
        assert_eq!(player.read_frame(1).unwrap(), Frame::Field(fields[1].clone()));
    }

    #[test]
    fn test_player_iterator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iter.rdfa");
        let fields = numbered_fields(3);
        record(&path, RecorderConfig::default(), &fields);

        let mut player = FramePlayer::open(&path).unwrap();
        let iter = player.frames();
        assert_eq!(iter.len(), 3);
        let frames: Vec<Frame> = iter.map(|f| f.unwrap()).collect();
        let expected: Vec<Frame> = fields.into_iter().map(Frame::Field).collect();
        assert_eq!(frames, expected);
    }

    #[test]
    fn test_surface_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surface.rdfa");
        let config = RecorderConfig {
            format: FrameFormat::Surface8,
            ..Default::default()
        };
        let mut recorder = FrameRecorder::new(&path, &test_config(), config).unwrap();
        let frame: Vec<u8> = (0..16 * 8 * 4).map(|i| (i % 251) as u8).collect();
        recorder.record_bytes(&frame).unwrap();
        recorder.finalize().unwrap();

        let mut player = FramePlayer::open(&path).unwrap();
        assert_eq!(player.read_frame(0).unwrap(), Frame::Surface8(frame));
    }

    #[test]
    fn test_out_of_range_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("range.rdfa");
        record(&path, RecorderConfig::default(), &numbered_fields(1));

        let mut player = FramePlayer::open(&path).unwrap();
        let err = player.read_frame(1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.rdfa");
        record(&path, RecorderConfig::default(), &numbered_fields(2));

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..ArchiveHeader::SIZE + 8]).unwrap();
        assert!(FramePlayer::open(&path).is_err());
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_lz4_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lz4.rdfa");
        let fields = numbered_fields(4);
        let config = RecorderConfig {
            compression: CompressionType::Lz4,
            ..Default::default()
        };
        record(&path, config, &fields);

        let mut player = FramePlayer::open(&path).unwrap();
        assert_eq!(player.read_frame(3).unwrap(), Frame::Field(fields[3].clone()));
    }
}
