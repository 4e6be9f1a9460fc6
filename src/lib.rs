//! movingimages is a JSON command-driven image and movie composition engine.
//!
//! Callers describe work as a [`CommandBatch`]: create bitmap contexts, movie importers, movie
//! editors and video frame writers, draw into bitmaps, cut movies together, write frames, and
//! read back properties. Each command yields a [`Reply`] with a stable [`ErrorCode`].
//!
//! - Build a [`Context`] (or use [`default_context`])
//! - Run batches with [`run_batch`], [`run_batch_async`] or [`run_batch_shared`]
//! - Plug movie decoding and encoding in through [`MediaBackend`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod batch;
mod context;
mod dispatch;
pub(crate) mod expression;
pub(crate) mod foundation;
pub(crate) mod graphics;
/// Movie decoding and encoding seams.
pub mod media;
/// Batch wire model.
pub mod protocol;
mod registry;
mod reply;
mod variables;

/// Value reported by the global `version` property.
pub const VERSION: &str = "0.3a";

pub use crate::batch::{BatchHandle, run_batch, run_batch_async, run_batch_shared, validate_batch};
pub use crate::context::{Context, ContextConfig, default_context};
pub use crate::dispatch::execute;
pub use crate::foundation::core::{Affine, Color, FrameRGBA, Point, Rect, Rgba8Premul, Size};
pub use crate::foundation::error::{MovingImagesError, MovingImagesResult};
pub use crate::foundation::time::{MediaTime, PREFERRED_TIMESCALE, TimeRange};
pub use crate::media::backend::{
    MediaBackend, MetadataItem, MovieFileType, MovieInfo, MovieSinkSpec, MovieSource, TrackInfo,
    UnavailableBackend,
};
#[cfg(feature = "media-ffmpeg")]
pub use crate::media::ffmpeg::FfmpegBackend;
pub use crate::media::sink::{FrameSink, InMemorySink, SinkConfig, SinkRecording, VideoCodec};
pub use crate::protocol::batch::CommandBatch;
pub use crate::registry::{ObjectReference, ObjectType, Selector};
pub use crate::reply::{ErrorCode, Reply};
pub use crate::variables::Variables;
