use anyhow::{anyhow, Context, Result};

use crate::frame::rgba_len;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Rgba32,
    Nv12,
    Yuyv,
    Mjpeg,
}

/// Convert a captured buffer to interleaved RGBA with opaque alpha.
pub(crate) fn normalize_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            expect_len(pixels, plane_len(width, height)?.checked_mul(3), "RGB")?;
            Ok(pixels
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect())
        }
        PixelFormat::Rgba32 => {
            expect_len(pixels, Some(rgba_len(width, height)?), "RGBA")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgba(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_rgba(pixels, width, height),
        PixelFormat::Mjpeg => mjpeg_to_rgba(pixels, width, height),
    }
}

fn plane_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn expect_len(pixels: &[u8], expected: Option<usize>, kind: &str) -> Result<()> {
    let expected = expected.ok_or_else(|| anyhow!("{} frame dimensions overflow", kind))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            kind,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height)?;
    expect_len(pixels, y_plane.checked_add(y_plane / 2), "NV12")?;

    let mut rgba = vec![0u8; y_plane * 4];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i];
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let offset = (j * w + i) * 4;
            write_yuv(&mut rgba[offset..offset + 4], y, pixels[uv_index], pixels[uv_index + 1]);
        }
    }
    Ok(rgba)
}

fn yuyv_to_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even width, got {}", width));
    }
    expect_len(pixels, plane_len(width, height)?.checked_mul(2), "YUYV")?;

    let mut rgba = Vec::with_capacity(rgba_len(width, height)?);
    for quad in pixels.chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        let mut px = [0u8; 4];
        write_yuv(&mut px, y0, u, v);
        rgba.extend_from_slice(&px);
        write_yuv(&mut px, y1, u, v);
        rgba.extend_from_slice(&px);
    }
    Ok(rgba)
}

fn mjpeg_to_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(pixels, image::ImageFormat::Jpeg)
        .context("decode MJPEG frame")?
        .to_rgba8();
    if decoded.dimensions() != (width, height) {
        return Err(anyhow!(
            "MJPEG frame is {}x{}, expected {}x{}",
            decoded.width(),
            decoded.height(),
            width,
            height
        ));
    }
    Ok(decoded.into_raw())
}

fn write_yuv(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
    out[3] = 255;
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
