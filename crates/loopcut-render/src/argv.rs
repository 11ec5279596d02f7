// Typed encode-argument construction (§6.2).
//
// These structs are the logical equivalent of the documented ffmpeg CLI
// argument vectors; `codec.rs` realizes them against the in-process codec
// runtime's typed configuration surface (stream/encoder options) rather than
// building literal argv strings — see SPEC_FULL.md §10.2.

use loopcut_core::helpers::geometry::derive_dimensions;
use loopcut_core::{Container, RenderConfiguration, VideoCodec};

#[derive(Debug, Clone)]
pub struct FastPathArgs {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub target_kbps: u32,
    pub max_kbps: u32,
}

/// Fast path caps at 30 fps and only ever targets mp4/h264 per §4.1's
/// eligibility test, but the codec field stays general in case a future
/// caller relaxes that gate (see §9's codec-runtime discussion).
pub fn fast_path_args(config: &RenderConfiguration, job_aspect_ratio: f64) -> FastPathArgs {
    let (width, height) = derive_dimensions(config.width, config.height, job_aspect_ratio);
    FastPathArgs {
        frame_rate: config.frame_rate.min(30),
        width,
        height,
        codec: config.codec,
        target_kbps: config.bitrate.target_kbps,
        max_kbps: config.bitrate.max_kbps,
    }
}

#[derive(Debug, Clone)]
pub struct QualityPathArgs {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub container: Container,
    pub pixel_format: PixelFormat,
    pub target_kbps: u32,
    pub max_kbps: u32,
    pub loop_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420p,
    Yuva420p,
}

pub fn quality_path_args(config: &RenderConfiguration, job_aspect_ratio: f64) -> QualityPathArgs {
    let (width, height) = derive_dimensions(config.width, config.height, job_aspect_ratio);
    let pixel_format = if config.container == Container::Webm && config.enable_alpha {
        PixelFormat::Yuva420p
    } else {
        PixelFormat::Yuv420p
    };
    QualityPathArgs {
        frame_rate: config.frame_rate,
        width,
        height,
        codec: config.codec,
        container: config.container,
        pixel_format,
        target_kbps: config.bitrate.target_kbps,
        max_kbps: config.bitrate.max_kbps,
        loop_output: config.loop_output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcut_core::{Bitrate, DecimationPolicy};

    fn config(container: Container, codec: VideoCodec, enable_alpha: bool) -> RenderConfiguration {
        RenderConfiguration::new(
            640,
            480,
            container,
            codec,
            30,
            Bitrate { target_kbps: 800, max_kbps: 1200 },
            enable_alpha,
            true,
            DecimationPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn fast_path_caps_frame_rate_at_30() {
        let mut cfg = config(Container::Mp4, VideoCodec::H264, false);
        cfg.frame_rate = 60;
        let args = fast_path_args(&cfg, 4.0 / 3.0);
        assert_eq!(args.frame_rate, 30);
    }

    #[test]
    fn quality_path_alpha_webm_uses_yuva420p() {
        let cfg = config(Container::Webm, VideoCodec::Vp9, true);
        let args = quality_path_args(&cfg, 4.0 / 3.0);
        assert_eq!(args.pixel_format, PixelFormat::Yuva420p);
    }

    #[test]
    fn quality_path_mp4_always_yuv420p() {
        let cfg = config(Container::Mp4, VideoCodec::H264, false);
        let args = quality_path_args(&cfg, 4.0 / 3.0);
        assert_eq!(args.pixel_format, PixelFormat::Yuv420p);
    }
}
