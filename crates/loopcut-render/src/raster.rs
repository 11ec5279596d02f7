// Worker Task: apply raster operations to a decoded RGBA frame and return it
// as a lossless PNG (§4.2). Pure, stateless per call.

use loopcut_core::RasterOp;

/// Applies `ops` in order to an RGBA buffer of `width * height` pixels.
pub fn apply_operations(width: u32, height: u32, bitmap: &[u8], ops: &[RasterOp]) -> Vec<u8> {
    let mut buf = bitmap.to_vec();
    for op in ops {
        match *op {
            RasterOp::Blur { radius } => box_blur(&mut buf, width, height, radius),
            RasterOp::Saturate { factor } => saturate(&mut buf, factor),
            RasterOp::Overlay { color } => overlay(&mut buf, color),
        }
    }
    buf
}

/// Uniform box blur, kernel side `2r+1`, clamp-to-edge sampling per axis.
fn box_blur(buf: &mut [u8], width: u32, height: u32, radius: u32) {
    if radius == 0 {
        return;
    }
    let (w, h) = (width as i64, height as i64);
    let src = buf.to_vec();
    let sample = |x: i64, y: i64, channel: usize| -> u32 {
        let cx = x.clamp(0, w - 1);
        let cy = y.clamp(0, h - 1);
        src[((cy * w + cx) * 4 + channel as i64) as usize] as u32
    };
    let r = radius as i64;
    let side = (2 * r + 1) as u32;
    for y in 0..h {
        for x in 0..w {
            for c in 0..4usize {
                let mut sum = 0u32;
                for dy in -r..=r {
                    for dx in -r..=r {
                        sum += sample(x + dx, y + dy, c);
                    }
                }
                let avg = (sum / (side * side)) as u8;
                buf[((y * w + x) * 4 + c as i64) as usize] = avg;
            }
        }
    }
}

/// Saturation against BT.601 luma `0.2989R + 0.587G + 0.114B`.
fn saturate(buf: &mut [u8], factor: f32) {
    for px in buf.chunks_exact_mut(4) {
        let r = px[0] as f32;
        let g = px[1] as f32;
        let b = px[2] as f32;
        let luma = 0.2989 * r + 0.587 * g + 0.114 * b;
        px[0] = lerp_channel(luma, r, factor);
        px[1] = lerp_channel(luma, g, factor);
        px[2] = lerp_channel(luma, b, factor);
    }
}

fn lerp_channel(luma: f32, channel: f32, factor: f32) -> u8 {
    (luma + (channel - luma) * factor).round().clamp(0.0, 255.0) as u8
}

/// Source-over alpha composite: `dst * (1 - a) + src * a`, `a = color.a / 255`.
fn overlay(buf: &mut [u8], color: [u8; 4]) {
    let a = color[3] as f32 / 255.0;
    if a <= 0.0 {
        return;
    }
    for px in buf.chunks_exact_mut(4) {
        px[0] = composite(px[0], color[0], a);
        px[1] = composite(px[1], color[1], a);
        px[2] = composite(px[2], color[2], a);
    }
}

fn composite(dst: u8, src: u8, a: f32) -> u8 {
    (dst as f32 * (1.0 - a) + src as f32 * a).round().clamp(0.0, 255.0) as u8
}

/// Encodes an RGBA buffer as a PNG, matching the teacher's `png::Encoder`
/// usage in `decode.rs`'s `emit_frame` (there: RGB stills; here: RGBA, since
/// frames may carry alpha).
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        (0..width * height).flat_map(|_| rgba).collect()
    }

    #[test]
    fn blur_on_uniform_image_is_identity() {
        let buf = solid(4, 4, [10, 20, 30, 255]);
        let out = apply_operations(4, 4, &buf, &[RasterOp::Blur { radius: 1 }]);
        assert_eq!(out, buf);
    }

    #[test]
    fn saturate_zero_collapses_to_grayscale() {
        let buf = vec![200u8, 10, 10, 255];
        let out = apply_operations(1, 1, &buf, &[RasterOp::Saturate { factor: 0.0 }]);
        assert_eq!(out[0], out[1]);
        assert_eq!(out[1], out[2]);
    }

    #[test]
    fn saturate_one_is_identity() {
        let buf = vec![200u8, 10, 40, 255];
        let out = apply_operations(1, 1, &buf, &[RasterOp::Saturate { factor: 1.0 }]);
        assert_eq!(out[..3], buf[..3]);
    }

    #[test]
    fn overlay_opaque_replaces_rgb() {
        let buf = vec![10u8, 20, 30, 255];
        let out = apply_operations(1, 1, &buf, &[RasterOp::Overlay { color: [1, 2, 3, 255] }]);
        assert_eq!(&out[..3], &[1, 2, 3]);
    }

    #[test]
    fn overlay_transparent_is_noop() {
        let buf = vec![10u8, 20, 30, 255];
        let out = apply_operations(1, 1, &buf, &[RasterOp::Overlay { color: [1, 2, 3, 0] }]);
        assert_eq!(out, buf);
    }

    #[test]
    fn encode_png_produces_valid_header() {
        let buf = solid(2, 2, [255, 0, 0, 255]);
        let png_bytes = encode_png(2, 2, &buf).unwrap();
        assert_eq!(&png_bytes[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    }
}
