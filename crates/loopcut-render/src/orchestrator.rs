// Render Orchestrator: the public entrypoint (§4.1).
//
// Grounded on the teacher's `worker.rs` spawn/measure/report shape
// (`start_encode` timing an operation and reporting via a result type),
// generalized from a channel-posted `MediaResult` into a direct
// `Result<RenderOutcome>` return since this crate's public API (§6.1) is a
// synchronous call, not a UI event stream.

use std::sync::Arc;
use std::time::Instant;

use loopcut_core::decimate::decimate;
use loopcut_core::helpers::mime::mime_type;
use loopcut_core::{
    AnimationSource, Container, PipelineKind, RenderCache, RenderError, RenderJob, RenderMetrics,
    RenderOutcome, RenderResult, Result, VideoCodec,
};

use crate::argv::{fast_path_args, quality_path_args};
use crate::codec::CodecDriver;
use crate::fetcher::{HttpFetcher, SourceFetcher};
use crate::pool::WorkerPool;
use crate::source;

pub struct Renderer {
    cache: RenderCache,
    pool: WorkerPool,
    codec: CodecDriver,
    fetcher: Box<dyn SourceFetcher>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            cache: RenderCache::default(),
            pool: WorkerPool::new(WorkerPool::default_size()),
            codec: CodecDriver::new(),
            fetcher: Box::new(HttpFetcher::new()),
        }
    }

    pub fn with_fetcher(fetcher: impl SourceFetcher + 'static) -> Self {
        Renderer {
            cache: RenderCache::default(),
            pool: WorkerPool::new(WorkerPool::default_size()),
            codec: CodecDriver::new(),
            fetcher: Box::new(fetcher),
        }
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool = WorkerPool::new(size);
        self
    }

    /// `render(job) -> outcome` (§4.1, §6.1).
    pub fn render(&self, job: &RenderJob) -> Result<RenderOutcome> {
        let started = Instant::now();
        log::info!("render job {} accepted, pipeline={:?}", job.id, job.options.pipeline);

        if let Some(key) = &job.options.cache_key {
            if let Some(outcome) = self.cache.get(key) {
                log::info!("render job {} served from cache (key={key})", job.id);
                return Ok(outcome);
            }
        }

        self.codec.ensure_ready()?;

        let is_fast_path = job.options.pipeline == PipelineKind::Fast
            && !matches!(job.source, AnimationSource::FrameSequence { .. })
            && job.options.configuration.container == Container::Mp4
            && job.options.configuration.codec == VideoCodec::H264
            && !job.options.configuration.enable_alpha;

        let outcome = if is_fast_path {
            self.render_fast_path(job, started)
        } else {
            self.render_quality_path(job, started)
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("render job {} failed: {} ({})", job.id, e, e.code());
                return Err(e);
            }
        };

        if let Some(key) = &job.options.cache_key {
            self.cache.set(key.clone(), outcome.clone());
        }
        Ok(outcome)
    }

    fn render_fast_path(&self, job: &RenderJob, started: Instant) -> Result<RenderOutcome> {
        let uri = source_uri(&job.source)?;

        let download_start = Instant::now();
        let bytes = self.fetcher.fetch(uri)?;
        let download_ms = elapsed_ms(download_start);

        let aspect_ratio = job.metadata.width as f64 / job.metadata.height as f64;
        let args = fast_path_args(&job.options.configuration, aspect_ratio);

        let encode_start = Instant::now();
        let video = self.codec.fast_path_transcode(job.id, &bytes, &args)?;
        let encode_ms = elapsed_ms(encode_start);

        let poster_frame = if job.options.fallback.produce_poster_frame {
            self.codec.extract_poster(job.id, &video, job.options.fallback.poster_format)
        } else {
            None
        };

        let output_size = video.len() as u64;
        let container = job.options.configuration.container;
        Ok(RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics {
                decode_time_ms: download_ms,
                render_time_ms: 0,
                encode_time_ms: encode_ms,
                total_time_ms: elapsed_ms(started),
                output_size_bytes: output_size,
                average_frame_processing_ms: 0.0,
            },
            result: RenderResult {
                video: Arc::from(video),
                container,
                mime_type: mime_type(container),
                duration_ms: job.metadata.duration_ms,
                frame_rate: args.frame_rate,
                poster_frame,
            },
        })
    }

    fn render_quality_path(&self, job: &RenderJob, started: Instant) -> Result<RenderOutcome> {
        let decode_start = Instant::now();
        let decoded = source::decode(&job.source, &job.metadata, job.id, self.fetcher.as_ref(), &self.codec)?;
        let decode_ms = elapsed_ms(decode_start);

        let selected = decimate(&decoded, &job.options.configuration.decimation);

        let aspect_ratio = job.metadata.width as f64 / job.metadata.height as f64;
        let args = quality_path_args(&job.options.configuration, aspect_ratio);

        let render_start = Instant::now();
        let processed = self.pool.process_all(&selected, args.width, args.height, &job.options.operations)?;
        let render_ms = elapsed_ms(render_start);

        let encode_start = Instant::now();
        let video = self.codec.quality_encode(job.id, &processed, &args)?;
        let encode_ms = elapsed_ms(encode_start);

        let poster_frame =
            if job.options.fallback.produce_poster_frame { processed.first().map(|f| f.png.clone()) } else { None };

        let duration_ms: u64 = processed.iter().map(|f| f.delay_ms as u64).sum();
        let average_frame_processing_ms =
            if processed.is_empty() { 0.0 } else { render_ms as f64 / processed.len() as f64 };

        let output_size = video.len() as u64;
        let container = job.options.configuration.container;
        Ok(RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics {
                decode_time_ms: decode_ms,
                render_time_ms: render_ms,
                encode_time_ms: encode_ms,
                total_time_ms: elapsed_ms(started),
                output_size_bytes: output_size,
                average_frame_processing_ms,
            },
            result: RenderResult {
                video: Arc::from(video),
                container,
                mime_type: mime_type(container),
                duration_ms,
                frame_rate: args.frame_rate,
                poster_frame,
            },
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn source_uri(source: &AnimationSource) -> Result<&str> {
    match source {
        AnimationSource::Gif { uri } | AnimationSource::Apng { uri } | AnimationSource::Video { uri } => Ok(uri),
        AnimationSource::FrameSequence { .. } => {
            Err(RenderError::UnsupportedSource("frameSequence is not eligible for the fast path".into()))
        }
    }
}
