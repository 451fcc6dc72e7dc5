//! Blocking texture readback.

use super::EngineError;
use crate::compute::pixels::check_region;

/// Row pitch of a copy into a buffer, padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copy a rectangle of `texture` to host memory, tightly packed.
///
/// Submits its own command buffer and blocks until the device has finished
/// all work queued before it.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, EngineError> {
    check_region(
        texture.width() as usize,
        texture.height() as usize,
        x as usize,
        y as usize,
        width as usize,
        height as usize,
    )?;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let bytes_per_pixel = texture
        .format()
        .block_copy_size(None)
        .unwrap_or(4);
    let unpadded = width * bytes_per_pixel;
    let padded = padded_bytes_per_row(unpadded);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::wait_indefinitely()).ok();
    rx.recv().map_err(|_| EngineError::ReadbackAborted)??;

    let mut out = Vec::with_capacity((unpadded * height) as usize);
    {
        let data = buffer_slice.get_mapped_range();
        for row in data.chunks_exact(padded as usize) {
            out.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    staging.unmap();

    log::debug!("Read back {width}x{height} region at ({x}, {y})");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(0), 0);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        // 4 RGBA32F pixels = 64 bytes
        assert_eq!(padded_bytes_per_row(4 * 16), 256);
        assert_eq!(padded_bytes_per_row(512 * 16), 8192);
        assert_eq!(padded_bytes_per_row(257), 512);
    }
}
