//! Binary layout of Reaction-Diffusion Frame Archive files.

use std::io::{self, Read, Write};

use crate::schema::SurfaceFormat;

/// Magic bytes identifying a frame archive.
pub const ARCHIVE_MAGIC: &[u8; 4] = b"RDFA";

/// Current format version.
pub const ARCHIVE_VERSION: u16 = 1;

/// Compression applied to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    #[default]
    None = 0,
    /// LZ4 block compression, size prepended.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

/// What one stored pixel is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// Four little-endian `f32` channels, straight from the field.
    #[default]
    Field,
    /// Four 8-bit channels in the surface's byte order.
    Surface8,
}

impl FrameFormat {
    /// Format matching readback bytes of a present surface.
    pub fn for_surface(format: SurfaceFormat) -> Self {
        match format {
            SurfaceFormat::Rgba32Float => FrameFormat::Field,
            SurfaceFormat::Rgba8Unorm
            | SurfaceFormat::Rgba8UnormSrgb
            | SurfaceFormat::Bgra8Unorm => FrameFormat::Surface8,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Field => 16,
            FrameFormat::Surface8 => 4,
        }
    }
}

/// Header flags. Compression lives in bits 0-3, the frame format in bit 4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveFlags {
    pub compression: CompressionType,
    pub format: FrameFormat,
}

impl ArchiveFlags {
    pub fn to_u16(self) -> u16 {
        let mut flags = self.compression as u16;
        if self.format == FrameFormat::Surface8 {
            flags |= 1 << 4;
        }
        flags
    }

    pub fn from_u16(v: u16) -> io::Result<Self> {
        let compression = CompressionType::from_u8((v & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown compression type {}", v & 0x0F),
            )
        })?;
        let format = if v & (1 << 4) != 0 {
            FrameFormat::Surface8
        } else {
            FrameFormat::Field
        };
        Ok(Self {
            compression,
            format,
        })
    }
}

/// Archive file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveHeader {
    pub width: u32,
    pub height: u32,
    /// Frames stored; rewritten when the recorder finishes.
    pub frame_count: u64,
    /// Display rate the frames were produced at.
    pub frame_rate: f32,
    /// Update iterations between consecutive displayed frames.
    pub iterations_per_frame: u32,
    pub flags: ArchiveFlags,
}

impl ArchiveHeader {
    /// Magic(4) + Version(2) + Flags(2) + Width(4) + Height(4) +
    /// FrameCount(8) + FrameRate(4) + Iterations(4) + Reserved(16) = 48
    pub const SIZE: usize = 48;

    /// Size of one uncompressed frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.flags.format.bytes_per_pixel()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(ARCHIVE_MAGIC)?;
        w.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
        w.write_all(&self.flags.to_u16().to_le_bytes())?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.frame_count.to_le_bytes())?;
        w.write_all(&self.frame_rate.to_le_bytes())?;
        w.write_all(&self.iterations_per_frame.to_le_bytes())?;
        w.write_all(&[0u8; 16])?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != ARCHIVE_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid RDFA magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != ARCHIVE_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported RDFA version: {version}"),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = ArchiveFlags::from_u16(u16::from_le_bytes(buf2))?;

        r.read_exact(&mut buf4)?;
        let width = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let height = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let frame_count = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let frame_rate = f32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let iterations_per_frame = u32::from_le_bytes(buf4);

        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            width,
            height,
            frame_count,
            frame_rate,
            iterations_per_frame,
            flags,
        })
    }
}

/// Index entry for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    /// Byte offset from start of file.
    pub offset: u64,
    /// Stored size in bytes.
    pub size: u64,
}

impl FrameIndex {
    pub const SIZE: usize = 16;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.offset.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf8)?;
        let offset = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf8)?;
        let size = u64::from_le_bytes(buf8);

        Ok(Self { offset, size })
    }
}

/// Encode field values as little-endian bytes.
pub fn encode_field(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian bytes into field values.
pub fn decode_field(bytes: &[u8]) -> io::Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Field frame of {} bytes is not whole floats", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    Ok(lz4_flex::compress_prepend_size(data))
}

#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
fn lz4_unavailable() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 frames need the `lz4` feature",
    )
}
