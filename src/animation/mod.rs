//! Frame export: recording readback frames and playing them back.
//!
//! # File Format
//!
//! The `.rdfa` (Reaction-Diffusion Frame Archive) format:
//!
//! ```text
//! Header (48 bytes):
//!   Magic: "RDFA" (4 bytes)
//!   Version: u16
//!   Flags: u16 (bits 0-3 compression, bit 4 set = 8-bit surface frames)
//!   Width: u32
//!   Height: u32
//!   Frame count: u64
//!   Frame rate: f32
//!   Iterations per frame: u32
//!   Reserved: 16 bytes
//!
//! Frame data (variable):
//!   Field frames: width * height * 4 channels * f32 LE
//!   Surface frames: width * height * 4 bytes
//!   Optionally LZ4 compressed
//!
//! Frame index table at end of file (frame_count * 16 bytes):
//!   Offset: u64
//!   Stored size: u64
//! ```

mod format;
mod player;
mod recorder;

pub use format::{
    ARCHIVE_MAGIC, ARCHIVE_VERSION, ArchiveFlags, ArchiveHeader, CompressionType, FrameFormat,
    FrameIndex,
};
pub use player::{Frame, FrameIterator, FramePlayer};
pub use recorder::{FrameRecorder, RecorderConfig, RecordingStats};
