// Source Decoder: dispatches on `source.type`, produces an ordered sequence
// of decoded RGBA frames (§4.4).
//
// GIF/APNG decode is enrichment from outside the teacher (it has no GIF
// decode path at all): grounded on
// `examples/other_examples/0bb0d98e_damus-io-notedeck__crates-notedeck-src-media-gif.rs.rs`'s
// `GifDecoder` + `AnimationDecoder` + `into_frames()` usage. Video-source
// decode is delegated to the `CodecDriver`, in the teacher's in-process
// ffmpeg idiom.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, Frame};

use loopcut_core::{AnimationSource, DecodedFrame, RenderError, Result, SourceMetadata};

use crate::codec::CodecDriver;
use crate::fetcher::SourceFetcher;

/// Decodes `source` into an ordered frame sequence. `job_id` scopes any VFS
/// names used by the video path (§6.5).
pub fn decode(
    source: &AnimationSource,
    metadata: &SourceMetadata,
    job_id: uuid::Uuid,
    fetcher: &dyn SourceFetcher,
    codec: &CodecDriver,
) -> Result<Vec<DecodedFrame>> {
    match source {
        AnimationSource::Gif { uri } => {
            let bytes = fetcher.fetch(uri)?;
            decode_gif_frames(&bytes)
        }
        AnimationSource::Apng { uri } => {
            let bytes = fetcher.fetch(uri)?;
            decode_apng_frames(&bytes)
        }
        AnimationSource::FrameSequence { frames, delay_ms } => {
            decode_frame_sequence(frames, *delay_ms)
        }
        AnimationSource::Video { uri } => {
            let bytes = fetcher.fetch(uri)?;
            codec.decode_video_frames(job_id, &bytes, metadata)
        }
    }
}

fn frame_to_decoded(index: u32, frame: Frame, is_key_frame: bool) -> DecodedFrame {
    let delay_ms = std::time::Duration::from(frame.delay()).as_millis().max(10) as u32;
    let bitmap = frame.into_buffer().into_raw();
    DecodedFrame { index, delay_ms, is_key_frame, bitmap }
}

fn decode_gif_frames(bytes: &[u8]) -> Result<Vec<DecodedFrame>> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| RenderError::DecodeFailed(format!("gif: {e}")))?;
    let frames = decoder
        .into_frames()
        .collect::<std::result::Result<Vec<_>, image::ImageError>>()
        .map_err(|e| RenderError::DecodeFailed(format!("gif: {e}")))?;
    // `image`'s GifDecoder composites each frame onto the canvas internally
    // (disposal handling lives inside the `gif` crate), so there is no
    // disposalType signal left to inspect here — only index==0 is
    // observable, which is the decision recorded in DESIGN.md.
    Ok(frames
        .into_iter()
        .enumerate()
        .map(|(i, f)| frame_to_decoded(i as u32, f, i == 0))
        .collect())
}

fn decode_apng_frames(bytes: &[u8]) -> Result<Vec<DecodedFrame>> {
    let decoder = PngDecoder::new(Cursor::new(bytes))
        .map_err(|e| RenderError::DecodeFailed(format!("apng: {e}")))?;
    let apng = decoder
        .apng()
        .map_err(|e| RenderError::DecodeFailed(format!("apng: {e}")))?;
    let frames = apng
        .into_frames()
        .collect::<std::result::Result<Vec<_>, image::ImageError>>()
        .map_err(|e| RenderError::DecodeFailed(format!("apng: {e}")))?;
    Ok(frames
        .into_iter()
        .enumerate()
        .map(|(i, f)| frame_to_decoded(i as u32, f, i == 0))
        .collect())
}

fn decode_frame_sequence(frames: &[Vec<u8>], delay_ms: u32) -> Result<Vec<DecodedFrame>> {
    Ok(frames
        .iter()
        .enumerate()
        .map(|(i, bitmap)| DecodedFrame {
            index: i as u32,
            delay_ms,
            is_key_frame: i == 0,
            bitmap: bitmap.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sequence_maps_directly() {
        let frames = vec![vec![1u8; 16], vec![2u8; 16], vec![3u8; 16]];
        let out = decode_frame_sequence(&frames, 40).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_key_frame);
        assert!(!out[1].is_key_frame);
        assert_eq!(out[2].delay_ms, 40);
        assert_eq!(out[2].bitmap, vec![3u8; 16]);
    }

    // Touches the real embedded codec runtime; ignored by default.
    #[ignore]
    #[test]
    fn video_source_decode_delegates_to_codec_driver() {
        use crate::argv::PixelFormat;
        use crate::fetcher::test_support::MockFetcher;
        use loopcut_core::ProcessedFrame;

        let codec = CodecDriver::new();
        let frame = (0..16 * 16).flat_map(|_| [20u8, 90, 160, 255]).collect::<Vec<u8>>();
        let png = crate::raster::encode_png(16, 16, &frame).unwrap();
        let seed_args = crate::argv::QualityPathArgs {
            frame_rate: 10,
            width: 16,
            height: 16,
            codec: loopcut_core::VideoCodec::H264,
            container: loopcut_core::Container::Mp4,
            pixel_format: PixelFormat::Yuv420p,
            target_kbps: 200,
            max_kbps: 400,
            loop_output: false,
        };
        let seed_job = uuid::Uuid::new_v4();
        let video = codec
            .quality_encode(seed_job, &[ProcessedFrame { index: 0, png, delay_ms: 100 }], &seed_args)
            .unwrap();

        let uri = "mock://video";
        let fetcher = MockFetcher::ok(uri, video);
        let source = AnimationSource::Video { uri: uri.into() };
        let metadata = SourceMetadata { width: 16, height: 16, frame_count: 1, frame_rate: 10, duration_ms: 100, has_alpha: false };

        let frames = decode(&source, &metadata, uuid::Uuid::new_v4(), &fetcher, &codec).unwrap();
        assert!(!frames.is_empty());
    }
}
