pub mod cache;
pub mod decimate;
pub mod error;
pub mod helpers;
pub mod model;

pub use cache::RenderCache;
pub use error::{RenderError, Result};
pub use model::{
    AnimationSource, Bitrate, CacheEntry, Container, DecimationPolicy, DecodedFrame,
    PerformanceBudget, PipelineKind, PosterFormat, PosterOptions, ProcessedFrame, RasterOp,
    RenderConfiguration, RenderJob, RenderMetrics, RenderOptions, RenderOutcome, RenderResult,
    SourceMetadata, VideoCodec,
};
