//! Built-in CPU codec backend
//!
//! Decodes PNG containers (via the `png` crate) and raw frames, encodes the
//! uncompressed identity target and BC5 two-channel blocks. The remaining
//! block formats need external kernels and report an unsupported mode.

use crate::{
    codec::{
        formats::{SourceFormat, TargetFormat},
        DecodedImage, EncodeOptions, PixelCodec,
    },
    error::{Result, ShuttleError},
    protocol::JobStatus,
};

/// Magic prefix of a raw-frame container
pub const RAW_FRAME_MAGIC: [u8; 4] = *b"TXRF";

/// Raw-frame header: magic, width, height, source format id
pub const RAW_FRAME_HEADER_SIZE: usize = 16;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Wrap decoded pixels in a raw-frame container
///
/// The inverse of the raw-frame decode path; hosts use it to push pixels
/// that never lived in a standard container.
pub fn encode_raw_frame(image: &DecodedImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(RAW_FRAME_HEADER_SIZE + image.pixels.len());
    out.extend_from_slice(&RAW_FRAME_MAGIC);
    out.extend_from_slice(&image.width.to_le_bytes());
    out.extend_from_slice(&image.height.to_le_bytes());
    out.extend_from_slice(&image.format.id().to_le_bytes());
    out.extend_from_slice(&image.pixels);
    out
}

/// Software decode/encode backend
#[derive(Debug, Default)]
pub struct CpuCodec;

impl CpuCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_raw_frame(container: &[u8]) -> Result<DecodedImage> {
        if container.len() < RAW_FRAME_HEADER_SIZE {
            return Err(ShuttleError::codec(
                JobStatus::DecodeFailed,
                "truncated raw frame header",
            ));
        }
        let width = u32::from_le_bytes([container[4], container[5], container[6], container[7]]);
        let height =
            u32::from_le_bytes([container[8], container[9], container[10], container[11]]);
        let format_id =
            u32::from_le_bytes([container[12], container[13], container[14], container[15]]);
        let format = SourceFormat::from_id(format_id).ok_or_else(|| {
            ShuttleError::codec(
                JobStatus::DecodeFailed,
                format!("raw frame carries unknown source format id {}", format_id),
            )
        })?;

        // The payload length is checked against the dimensions by the
        // pipeline's pixel-extraction step, not here.
        Ok(DecodedImage {
            width,
            height,
            format,
            pixels: container[RAW_FRAME_HEADER_SIZE..].to_vec(),
        })
    }

    fn decode_png(container: &[u8]) -> Result<DecodedImage> {
        let decoder = png::Decoder::new(std::io::Cursor::new(container));
        let mut reader = decoder.read_info().map_err(|e| {
            ShuttleError::codec(JobStatus::DecodeFailed, format!("png header: {}", e))
        })?;

        let mut pixels = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut pixels).map_err(|e| {
            ShuttleError::codec(JobStatus::DecodeFailed, format!("png frame: {}", e))
        })?;
        pixels.truncate(info.buffer_size());

        if info.bit_depth != png::BitDepth::Eight {
            return Err(ShuttleError::codec(
                JobStatus::DecodeFailed,
                format!("unsupported png bit depth {:?}", info.bit_depth),
            ));
        }
        let format = match info.color_type {
            png::ColorType::Rgb => SourceFormat::Rgb24,
            png::ColorType::Rgba => SourceFormat::Rgba32,
            other => {
                return Err(ShuttleError::codec(
                    JobStatus::DecodeFailed,
                    format!("unsupported png color type {:?}", other),
                ))
            }
        };

        Ok(DecodedImage {
            width: info.width,
            height: info.height,
            format,
            pixels,
        })
    }

    fn encode_identity(image: &DecodedImage) -> Result<Vec<u8>> {
        if image.format != SourceFormat::Rgba32 {
            return Err(ShuttleError::codec(
                JobStatus::BadParameters,
                "identity encode expects normalized RGBA pixels",
            ));
        }
        Ok(image.pixels.clone())
    }

    fn encode_bc5(image: &DecodedImage) -> Result<Vec<u8>> {
        if image.format != SourceFormat::Rgba32 {
            return Err(ShuttleError::codec(
                JobStatus::BadParameters,
                "BC5 encode expects normalized RGBA pixels",
            ));
        }
        if image.width % 4 != 0 || image.height % 4 != 0 {
            return Err(ShuttleError::codec(
                JobStatus::BadParameters,
                format!("BC5 needs a 4x4 grid, got {}x{}", image.width, image.height),
            ));
        }

        let width = image.width as usize;
        let mut out = Vec::with_capacity(TargetFormat::Bc5.encoded_len(image.width, image.height));
        for block_y in 0..image.height as usize / 4 {
            for block_x in 0..width / 4 {
                let mut red = [0u8; 16];
                let mut green = [0u8; 16];
                for py in 0..4 {
                    for px in 0..4 {
                        let src = ((block_y * 4 + py) * width + block_x * 4 + px) * 4;
                        red[py * 4 + px] = image.pixels[src];
                        green[py * 4 + px] = image.pixels[src + 1];
                    }
                }
                out.extend_from_slice(&compress_alpha_block(&red));
                out.extend_from_slice(&compress_alpha_block(&green));
            }
        }
        Ok(out)
    }
}

impl PixelCodec for CpuCodec {
    fn decode(&self, container: &[u8]) -> Result<DecodedImage> {
        if container.len() >= RAW_FRAME_MAGIC.len() && container[..4] == RAW_FRAME_MAGIC {
            Self::decode_raw_frame(container)
        } else if container.len() >= PNG_SIGNATURE.len() && container[..8] == PNG_SIGNATURE {
            Self::decode_png(container)
        } else {
            Err(ShuttleError::codec(
                JobStatus::UnknownImageFormat,
                "container magic not recognized",
            ))
        }
    }

    fn encode(
        &self,
        image: &DecodedImage,
        target: TargetFormat,
        _options: &EncodeOptions,
    ) -> Result<Vec<u8>> {
        match target {
            TargetFormat::Rgba32 => Self::encode_identity(image),
            TargetFormat::Bc5 => Self::encode_bc5(image),
            TargetFormat::Astc4x4
            | TargetFormat::Astc6x6
            | TargetFormat::Astc8x8
            | TargetFormat::Astc10x10
            | TargetFormat::Astc12x12
            | TargetFormat::Bc7 => Err(ShuttleError::codec(
                JobStatus::UnsupportedMode,
                format!("no CPU kernel for {:?}", target),
            )),
        }
    }
}

/// Compress one single-channel 4x4 block: two reference values followed by
/// sixteen 3-bit palette indices in a 48-bit little-endian field
fn compress_alpha_block(values: &[u8; 16]) -> [u8; 8] {
    let ref0 = values.iter().copied().fold(0, u8::max);
    let ref1 = values.iter().copied().fold(255, u8::min);
    let palette = alpha_palette(ref0, ref1);

    let mut indices = 0u64;
    for (i, &value) in values.iter().enumerate() {
        let mut best = 0u64;
        let mut best_err = i32::MAX;
        for (code, &candidate) in palette.iter().enumerate() {
            let err = (value as i32 - candidate as i32).abs();
            if err < best_err {
                best_err = err;
                best = code as u64;
            }
        }
        indices |= best << (3 * i);
    }

    let mut block = [0u8; 8];
    block[0] = ref0;
    block[1] = ref1;
    block[2..8].copy_from_slice(&indices.to_le_bytes()[..6]);
    block
}

/// Expand one compressed single-channel block back to 16 values
pub fn decompress_alpha_block(block: &[u8; 8]) -> [u8; 16] {
    let palette = alpha_palette(block[0], block[1]);
    let mut raw = [0u8; 8];
    raw[..6].copy_from_slice(&block[2..8]);
    let bits = u64::from_le_bytes(raw);

    let mut out = [0u8; 16];
    for (i, value) in out.iter_mut().enumerate() {
        *value = palette[((bits >> (3 * i)) & 0b111) as usize];
    }
    out
}

/// Decode BC5 blocks back to RGBA (blue zero, alpha opaque)
pub fn decode_bc5(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = TargetFormat::Bc5.encoded_len(width, height);
    if width % 4 != 0 || height % 4 != 0 || data.len() != expected {
        return Err(ShuttleError::codec(
            JobStatus::BadParameters,
            format!(
                "BC5 data of {} bytes does not describe {}x{}",
                data.len(),
                width,
                height
            ),
        ));
    }

    let w = width as usize;
    let mut pixels = vec![0u8; w * height as usize * 4];
    for (block_index, block) in data.chunks_exact(16).enumerate() {
        let block_x = block_index % (w / 4);
        let block_y = block_index / (w / 4);
        let mut red_half = [0u8; 8];
        red_half.copy_from_slice(&block[0..8]);
        let mut green_half = [0u8; 8];
        green_half.copy_from_slice(&block[8..16]);
        let red = decompress_alpha_block(&red_half);
        let green = decompress_alpha_block(&green_half);
        for py in 0..4 {
            for px in 0..4 {
                let dst = ((block_y * 4 + py) * w + block_x * 4 + px) * 4;
                pixels[dst] = red[py * 4 + px];
                pixels[dst + 1] = green[py * 4 + px];
                pixels[dst + 3] = 0xFF;
            }
        }
    }
    Ok(pixels)
}

/// Interpolated palette for one block, eight entries
///
/// ref0 > ref1 selects the eight-step ramp; otherwise six steps plus the
/// constant 0 and 255 endpoints.
fn alpha_palette(ref0: u8, ref1: u8) -> [u8; 8] {
    let r0 = ref0 as i32;
    let r1 = ref1 as i32;
    let mut palette = [0u8; 8];
    palette[0] = ref0;
    palette[1] = ref1;
    if r0 > r1 {
        for i in 1..7 {
            palette[i + 1] = (((7 - i as i32) * r0 + i as i32 * r1) / 7) as u8;
        }
    } else {
        for i in 1..5 {
            palette[i + 1] = (((5 - i as i32) * r0 + i as i32 * r1) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_image(width: u32, height: u32, pixels: Vec<u8>) -> DecodedImage {
        DecodedImage {
            width,
            height,
            format: SourceFormat::Rgba32,
            pixels,
        }
    }

    fn options() -> EncodeOptions {
        EncodeOptions {
            quality: 1.0,
            thread_count: 0,
        }
    }

    #[test]
    fn test_raw_frame_roundtrip() {
        let image = rgba_image(2, 2, vec![7u8; 16]);
        let container = encode_raw_frame(&image);
        assert_eq!(container.len(), RAW_FRAME_HEADER_SIZE + 16);

        let decoded = CpuCodec::new().decode(&container).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_unknown_magic_is_reported() {
        let err = CpuCodec::new().decode(&[0u8; 64]).unwrap_err();
        assert_eq!(err.job_status(), JobStatus::UnknownImageFormat);
    }

    #[test]
    fn test_truncated_raw_header_fails_decode() {
        let err = CpuCodec::new().decode(b"TXRF\x01\x00").unwrap_err();
        assert_eq!(err.job_status(), JobStatus::DecodeFailed);
    }

    #[test]
    fn test_png_decode() {
        // 2x1 RGBA: one red pixel, one translucent green pixel
        let pixels = [255, 0, 0, 255, 0, 255, 0, 128];
        let mut container = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut container, 2, 1);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&pixels).unwrap();
        }

        let decoded = CpuCodec::new().decode(&container).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(decoded.format, SourceFormat::Rgba32);
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn test_corrupt_png_fails_decode() {
        let mut container = PNG_SIGNATURE.to_vec();
        container.extend_from_slice(&[0u8; 16]);
        let err = CpuCodec::new().decode(&container).unwrap_err();
        assert_eq!(err.job_status(), JobStatus::DecodeFailed);
    }

    #[test]
    fn test_alpha_block_exact_on_two_values() {
        let mut values = [32u8; 16];
        for v in values.iter_mut().skip(8) {
            *v = 200;
        }
        let block = compress_alpha_block(&values);
        assert_eq!(decompress_alpha_block(&block), values);
    }

    #[test]
    fn test_alpha_block_uniform() {
        let values = [77u8; 16];
        let block = compress_alpha_block(&values);
        assert_eq!(decompress_alpha_block(&block), values);
    }

    #[test]
    fn test_bc5_roundtrip_two_tone_normal_map() {
        // 4x4 normal-ish data in R and G, B and A ignored by BC5
        let mut pixels = vec![0u8; 4 * 4 * 4];
        for (i, pixel) in pixels.chunks_exact_mut(4).enumerate() {
            pixel[0] = if i % 2 == 0 { 10 } else { 240 };
            pixel[1] = if i < 8 { 60 } else { 190 };
            pixel[2] = 99;
            pixel[3] = 7;
        }
        let image = rgba_image(4, 4, pixels.clone());
        let encoded = CpuCodec::new()
            .encode(&image, TargetFormat::Bc5, &options())
            .unwrap();
        assert_eq!(encoded.len(), 16);

        let decoded = decode_bc5(&encoded, 4, 4).unwrap();
        for (i, pixel) in decoded.chunks_exact(4).enumerate() {
            assert_eq!(pixel[0], pixels[i * 4]);
            assert_eq!(pixel[1], pixels[i * 4 + 1]);
            assert_eq!(pixel[2], 0);
            assert_eq!(pixel[3], 0xFF);
        }
    }

    #[test]
    fn test_bc5_rejects_unaligned_dims() {
        let image = rgba_image(3, 4, vec![0u8; 3 * 4 * 4]);
        let err = CpuCodec::new()
            .encode(&image, TargetFormat::Bc5, &options())
            .unwrap_err();
        assert_eq!(err.job_status(), JobStatus::BadParameters);
    }

    #[test]
    fn test_identity_encode_copies_pixels() {
        let image = rgba_image(2, 2, vec![3u8; 16]);
        let encoded = CpuCodec::new()
            .encode(&image, TargetFormat::Rgba32, &options())
            .unwrap();
        assert_eq!(encoded, image.pixels);
    }

    #[test]
    fn test_astc_reports_unsupported_mode() {
        let image = rgba_image(4, 4, vec![0u8; 64]);
        let err = CpuCodec::new()
            .encode(&image, TargetFormat::Astc4x4, &options())
            .unwrap_err();
        assert_eq!(err.job_status(), JobStatus::UnsupportedMode);
    }
}
