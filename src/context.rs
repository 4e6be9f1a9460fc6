//! Execution context: live objects, variables, the image collection and the media backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::graphics::bitmap::BitmapContext;
use crate::media::backend::MediaBackend;
use crate::media::editor::MovieEditor;
use crate::media::importer::{FrameGrab, MovieImporter};
use crate::media::writer::VideoFramesWriter;
use crate::registry::{ObjectType, Registry, Selector, lock};
use crate::variables::Variables;

/// Tunables of a context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Deepest accepted nesting of `drawinstructions`.
    pub max_draw_depth: usize,
    /// `ffmpeg` executable used by the process backend.
    pub ffmpeg_path: PathBuf,
    /// `ffprobe` executable used by the process backend.
    pub ffprobe_path: PathBuf,
    /// Largest bitmap width or height accepted by `create`.
    pub max_bitmap_dimension: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_draw_depth: 32,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            max_bitmap_dimension: 16_384,
        }
    }
}

impl ContextConfig {
    /// Parse a JSON config object; missing keys keep their defaults.
    pub fn from_json_str(text: &str) -> MovingImagesResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(MovingImagesError::invalid_parameter(
                "config must be a JSON object",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> MovingImagesResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    fn backend(&self) -> Arc<dyn MediaBackend> {
        #[cfg(feature = "media-ffmpeg")]
        {
            Arc::new(crate::media::ffmpeg::FfmpegBackend::new(
                &self.ffmpeg_path,
                &self.ffprobe_path,
            ))
        }
        #[cfg(not(feature = "media-ffmpeg"))]
        {
            Arc::new(crate::media::backend::UnavailableBackend)
        }
    }
}

/// A registry entry.
#[derive(Debug)]
pub(crate) enum Object {
    Bitmap(BitmapContext),
    Importer(MovieImporter),
    Editor(MovieEditor),
    Writer(VideoFramesWriter),
}

impl Object {
    pub(crate) fn kind(&self) -> ObjectType {
        match self {
            Self::Bitmap(_) => ObjectType::BitmapContext,
            Self::Importer(_) => ObjectType::MovieImporter,
            Self::Editor(_) => ObjectType::MovieEditor,
            Self::Writer(_) => ObjectType::VideoFramesWriter,
        }
    }

    pub(crate) fn bitmap(&mut self) -> Option<&mut BitmapContext> {
        match self {
            Self::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn importer(&mut self) -> Option<&mut MovieImporter> {
        match self {
            Self::Importer(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn editor(&mut self) -> Option<&mut MovieEditor> {
        match self {
            Self::Editor(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn writer(&mut self) -> Option<&mut VideoFramesWriter> {
        match self {
            Self::Writer(w) => Some(w),
            _ => None,
        }
    }
}

/// Everything a batch runs against.
///
/// A context is single-writer: batches take `&mut Context`. Share one between threads as
/// `Arc<Mutex<Context>>` (see [`crate::run_batch_async`]).
pub struct Context {
    pub(crate) objects: Registry<Object>,
    pub(crate) variables: Variables,
    pub(crate) images: HashMap<String, Arc<FrameRGBA>>,
    pub(crate) backend: Arc<dyn MediaBackend>,
    pub(crate) config: ContextConfig,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("objects", &self.objects.count(None))
            .field("variables", &self.variables.len())
            .field("images", &self.images.len())
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Context with the default config and the compiled-in backend.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Context whose backend runs the executables named in `config`.
    pub fn with_config(config: ContextConfig) -> Self {
        let backend = config.backend();
        Self::with_backend_and_config(backend, config)
    }

    /// Context using `backend` for every movie operation.
    pub fn with_backend(backend: Arc<dyn MediaBackend>) -> Self {
        Self::with_backend_and_config(backend, ContextConfig::default())
    }

    /// Context using both `backend` and `config`.
    pub fn with_backend_and_config(backend: Arc<dyn MediaBackend>, config: ContextConfig) -> Self {
        Self {
            objects: Registry::default(),
            variables: Variables::new(),
            images: HashMap::new(),
            backend,
            config,
        }
    }

    /// Fresh context sharing this one's backend and config.
    pub(crate) fn local(&self) -> Self {
        Self::with_backend_and_config(Arc::clone(&self.backend), self.config.clone())
    }

    /// Active configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Variables visible to path substitutions and equations.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Mutable variables, for binding values between batches.
    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Live objects, optionally only those of `kind`.
    pub fn object_count(&self, kind: Option<ObjectType>) -> usize {
        self.objects.count(kind)
    }

    /// Images in the collection.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Pixels stored under `identifier`, premultiplied RGBA.
    pub fn image(&self, identifier: &str) -> Option<Arc<FrameRGBA>> {
        self.images.get(identifier).cloned()
    }

    /// Close every object and forget every image and variable.
    pub fn reset(&mut self) {
        let closed = self.objects.close_all(None);
        self.images.clear();
        self.variables = Variables::new();
        tracing::debug!(closed, "context reset");
    }

    pub(crate) fn collection_image(&self, identifier: &str) -> MovingImagesResult<Arc<FrameRGBA>> {
        self.image(identifier).ok_or_else(|| {
            MovingImagesError::invalid_image_identifier(format!(
                "no image '{identifier}' in the collection"
            ))
        })
    }

    /// Image produced by an object: a bitmap's pixels, an importer frame or an editor's
    /// composition map.
    pub(crate) fn image_from_object(
        &self,
        selector: &Selector,
        grab: &FrameGrab,
    ) -> MovingImagesResult<FrameRGBA> {
        let resolved = self.objects.resolve(selector)?;
        let mut object = lock(&resolved.handle);
        match &mut *object {
            Object::Bitmap(b) => Ok(b.snapshot()),
            Object::Importer(i) => Ok(i.grab(grab)?.0),
            Object::Editor(e) => e.composition_map(),
            Object::Writer(_) => Err(MovingImagesError::operation_failed(format!(
                "{selector} cannot provide an image"
            ))),
        }
    }
}

/// Process-wide context, created on first use.
///
/// It derefs to the `Mutex<Context>` and can be handed to [`crate::run_batch_async`] as is.
pub fn default_context() -> &'static Arc<Mutex<Context>> {
    static DEFAULT: OnceLock<Arc<Mutex<Context>>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(Mutex::new(Context::new())))
}

#[cfg(test)]
#[path = "../tests/unit/context.rs"]
mod tests;
