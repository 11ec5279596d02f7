// Data model for a render job: everything that flows from an `AnimationSource`
// through to a cached `RenderOutcome`. Validation lives on the constructors
// (`RenderConfiguration::new`, `RenderJob::new`) so an `InvalidJob` error can
// only ever be raised at construction time, never deep in the pipeline.

use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Tagged input to a render job. `uri`-bearing variants are resolved by a
/// caller-supplied fetcher; `FrameSequence` carries its bitmaps inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnimationSource {
    Gif { uri: String },
    Apng { uri: String },
    Video { uri: String },
    FrameSequence { frames: Vec<Vec<u8>>, delay_ms: u32 },
}

impl AnimationSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnimationSource::Gif { .. } => "gif",
            AnimationSource::Apng { .. } => "apng",
            AnimationSource::Video { .. } => "video",
            AnimationSource::FrameSequence { .. } => "frameSequence",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub frame_rate: u32,
    pub duration_ms: u64,
    pub has_alpha: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    Webm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineKind {
    Fast,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PosterFormat {
    Png,
    Webp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bitrate {
    pub target_kbps: u32,
    pub max_kbps: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecimationPolicy {
    pub enabled: bool,
    pub min_interval_ms: u32,
    pub similarity_threshold: f32,
}

impl Default for DecimationPolicy {
    fn default() -> Self {
        DecimationPolicy { enabled: false, min_interval_ms: 16, similarity_threshold: 0.92 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderConfiguration {
    pub width: u32,
    pub height: u32,
    pub container: Container,
    pub codec: VideoCodec,
    pub frame_rate: u32,
    pub bitrate: Bitrate,
    pub enable_alpha: bool,
    pub loop_output: bool,
    pub decimation: DecimationPolicy,
}

impl RenderConfiguration {
    /// Validates §3's `RenderConfiguration` invariants; all fields are taken
    /// by value so a caller can't mutate a validated instance back into an
    /// invalid one.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: u32,
        height: u32,
        container: Container,
        codec: VideoCodec,
        frame_rate: u32,
        bitrate: Bitrate,
        enable_alpha: bool,
        loop_output: bool,
        decimation: DecimationPolicy,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidJob("width and height must be positive".into()));
        }
        if width > 1280 || height > 720 {
            return Err(RenderError::InvalidJob("dimensions exceed 1280x720".into()));
        }
        if !(1..=60).contains(&frame_rate) {
            return Err(RenderError::InvalidJob("frameRate must be in [1,60]".into()));
        }
        if bitrate.target_kbps > bitrate.max_kbps {
            return Err(RenderError::InvalidJob("targetKbps must be <= maxKbps".into()));
        }
        if enable_alpha && container != Container::Webm {
            return Err(RenderError::InvalidJob("enableAlpha requires container=webm".into()));
        }
        if !(8..=200).contains(&decimation.min_interval_ms) {
            return Err(RenderError::InvalidJob("decimation.minIntervalMs must be in [8,200]".into()));
        }
        if !(0.0..=1.0).contains(&decimation.similarity_threshold) {
            return Err(RenderError::InvalidJob("decimation.similarityThreshold must be in [0,1]".into()));
        }
        Ok(RenderConfiguration {
            width,
            height,
            container,
            codec,
            frame_rate,
            bitrate,
            enable_alpha,
            loop_output,
            decimation,
        })
    }
}

/// A single raster operation applied, in order, by the worker pool (§4.2, §6.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum RasterOp {
    Blur { radius: u32 },
    Saturate { factor: f32 },
    Overlay { color: [u8; 4] },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PosterOptions {
    pub produce_poster_frame: bool,
    pub poster_format: PosterFormat,
}

impl Default for PosterOptions {
    fn default() -> Self {
        PosterOptions { produce_poster_frame: false, poster_format: PosterFormat::Png }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceBudget {
    /// Advisory only; the core records it in metrics but never aborts a
    /// running codec invocation because of it (§5).
    pub max_render_ms: Option<u64>,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        PerformanceBudget { max_render_ms: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    pub configuration: RenderConfiguration,
    pub pipeline: PipelineKind,
    pub fallback: PosterOptions,
    pub performance_budget: PerformanceBudget,
    pub cache_key: Option<String>,
    /// Operations applied to every dispatched frame on the quality path.
    /// Empty by default — see the open-question decision in DESIGN.md.
    pub operations: Vec<RasterOp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: Uuid,
    pub source: AnimationSource,
    pub metadata: SourceMetadata,
    pub options: RenderOptions,
    pub created_at: SystemTime,
}

impl RenderJob {
    pub fn new(source: AnimationSource, metadata: SourceMetadata, options: RenderOptions) -> Result<Self> {
        if metadata.width == 0 || metadata.height == 0 {
            return Err(RenderError::InvalidJob("metadata dimensions must be positive".into()));
        }
        if metadata.frame_count == 0 {
            return Err(RenderError::InvalidJob("metadata.frameCount must be positive".into()));
        }
        if !(1..=60).contains(&metadata.frame_rate) {
            return Err(RenderError::InvalidJob("metadata.frameRate must be in [1,60]".into()));
        }
        if let AnimationSource::FrameSequence { ref frames, delay_ms } = source {
            if frames.is_empty() {
                return Err(RenderError::InvalidJob("frameSequence must have at least one frame".into()));
            }
            if delay_ms == 0 {
                return Err(RenderError::InvalidJob("frameSequence delayMs must be positive".into()));
            }
        }
        Ok(RenderJob { id: Uuid::new_v4(), source, metadata, options, created_at: SystemTime::now() })
    }
}

#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: u32,
    pub delay_ms: u32,
    pub is_key_frame: bool,
    pub bitmap: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub index: u32,
    pub png: Vec<u8>,
    pub delay_ms: u32,
}

#[derive(Debug, Clone)]
pub struct RenderMetrics {
    pub decode_time_ms: u64,
    pub render_time_ms: u64,
    pub encode_time_ms: u64,
    pub total_time_ms: u64,
    pub output_size_bytes: u64,
    pub average_frame_processing_ms: f64,
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub video: Arc<[u8]>,
    pub container: Container,
    pub mime_type: &'static str,
    pub duration_ms: u64,
    pub frame_rate: u32,
    pub poster_frame: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub from_cache: bool,
    pub metrics: RenderMetrics,
    pub result: RenderResult,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: RenderOutcome,
    pub created_at: std::time::Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitrate() -> Bitrate {
        Bitrate { target_kbps: 800, max_kbps: 1200 }
    }

    #[test]
    fn rejects_oversize_dimensions() {
        let err = RenderConfiguration::new(
            1920, 1080, Container::Mp4, VideoCodec::H264, 30, bitrate(), false, true, DecimationPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "animated-renderer.invalid-job");
    }

    #[test]
    fn rejects_alpha_without_webm() {
        let err = RenderConfiguration::new(
            640, 480, Container::Mp4, VideoCodec::H264, 30, bitrate(), true, true, DecimationPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "animated-renderer.invalid-job");
    }

    #[test]
    fn accepts_valid_configuration() {
        let cfg = RenderConfiguration::new(
            640, 480, Container::Webm, VideoCodec::Vp9, 30, bitrate(), true, true, DecimationPolicy::default(),
        )
        .unwrap();
        assert_eq!(cfg.width, 640);
    }

    #[test]
    fn rejects_zero_frame_count() {
        let cfg = RenderConfiguration::new(
            640, 480, Container::Mp4, VideoCodec::H264, 30, bitrate(), false, true, DecimationPolicy::default(),
        )
        .unwrap();
        let options = RenderOptions {
            configuration: cfg,
            pipeline: PipelineKind::Fast,
            fallback: PosterOptions::default(),
            performance_budget: PerformanceBudget::default(),
            cache_key: None,
            operations: Vec::new(),
        };
        let metadata = SourceMetadata { width: 640, height: 480, frame_count: 0, frame_rate: 30, duration_ms: 0, has_alpha: false };
        let err = RenderJob::new(AnimationSource::Gif { uri: "https://example.com/a.gif".into() }, metadata, options).unwrap_err();
        assert_eq!(err.code(), "animated-renderer.invalid-job");
    }
}
