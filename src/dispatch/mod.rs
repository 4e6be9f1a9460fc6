//! Command dispatcher: one JSON command in, one [`Reply`] out.

mod process;
mod properties;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::context::{Context, Object};
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::MediaTime;
use crate::graphics::bitmap::BitmapContext;
use crate::graphics::codec::{self, ImageFileType};
use crate::graphics::draw::{DrawElement, ImageRef};
use crate::graphics::render::ImageMap;
use crate::media::backend::MovieFileType;
use crate::media::editor::{ExportRequest, MovieEditor, SegmentSource};
use crate::media::importer::{FrameGrab, FrameTime, MovieImporter};
use crate::media::writer::VideoFramesWriter;
use crate::protocol::command::{Command, CreateKind, ExportTarget, ImageSample, SegmentInsert};
use crate::protocol::property::DataType;
use crate::protocol::values::Fields;
use crate::registry::{ObjectType, Selector, lock};
use crate::reply::Reply;

/// Run one command against `ctx`. Failures come back as error replies, never as panics.
pub fn execute(ctx: &mut Context, command: &Value) -> Reply {
    match try_execute(ctx, command) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            Reply::from(e)
        }
    }
}

fn try_execute(ctx: &mut Context, command: &Value) -> MovingImagesResult<Reply> {
    if !command.is_object() {
        return Err(MovingImagesError::invalid_command("a command must be a JSON dictionary"));
    }
    let parsed = {
        let f = Fields::new(command, Some(&ctx.variables))?;
        Command::parse(&f, ctx.config.max_draw_depth)?
    };
    tracing::debug!(verb = parsed.verb(), "dispatch");
    run(ctx, parsed)
}

/// Structural check of one command without touching any context.
pub(crate) fn validate(command: &Value, max_draw_depth: usize) -> MovingImagesResult<()> {
    if !command.is_object() {
        return Err(MovingImagesError::invalid_command("a command must be a JSON dictionary"));
    }
    Command::parse(&Fields::new(command, None)?, max_draw_depth).map(|_| ())
}

fn run(ctx: &mut Context, command: Command) -> MovingImagesResult<Reply> {
    match command {
        Command::Create { name, kind } => create(ctx, name, kind),
        Command::Close(selector) => {
            let kind = ctx.objects.close(&selector)?;
            tracing::debug!(%kind, "closed {selector}");
            Ok(Reply::ok())
        }
        Command::CloseAll(kind) => {
            let closed = ctx.objects.close_all(kind);
            Ok(Reply::number(closed as f64))
        }
        Command::GetProperty { receiver: None, query } => {
            Ok(properties::global(ctx, &query)?.into_reply(query.data_type))
        }
        Command::GetProperty {
            receiver: Some(selector),
            query,
        } => Ok(properties::object(ctx, &selector, &query)?.into_reply(query.data_type)),
        Command::SetProperty {
            receiver,
            track,
            setting,
        } => {
            let resolved = ctx.objects.resolve(&receiver)?;
            let mut object = lock(&resolved.handle);
            match &mut *object {
                Object::Editor(e) => e.set_property(track.as_ref(), &setting)?,
                other => {
                    return Err(MovingImagesError::invalid_property(format!(
                        "{} has no settable properties",
                        other.kind()
                    )));
                }
            }
            Ok(Reply::ok())
        }
        Command::GetProperties {
            receiver,
            track,
            save_as,
        } => {
            let map = properties::dictionary(ctx, &receiver, track.as_ref())?;
            Ok(match save_as {
                DataType::JsonString => Reply::string(Value::Object(map).to_string()),
                DataType::DictionaryObject => Reply::dictionary(map),
            })
        }
        Command::DrawElement { receiver, element } => draw(ctx, &receiver, &element),
        Command::GetPixelData { receiver, rect } => {
            let map = with_receiver(ctx, &receiver, "getpixeldata", Object::bitmap, |b| b.pixel_data(rect))?;
            let text = Value::Object(map.clone()).to_string();
            Ok(Reply::dictionary(map).with_string(text))
        }
        Command::AssignImage {
            receiver,
            identifier,
            grab,
        } => {
            let frame = ctx.image_from_object(&receiver, &grab)?;
            tracing::debug!(%identifier, width = frame.width, height = frame.height, "image assigned");
            ctx.images.insert(identifier, Arc::new(frame));
            Ok(Reply::ok())
        }
        Command::LoadImage { path, identifier } => {
            let frame = codec::decode_image(Path::new(&path))?;
            tracing::debug!(%identifier, %path, "image loaded");
            ctx.images.insert(identifier, Arc::new(frame));
            Ok(Reply::ok())
        }
        Command::RemoveImage(identifier) => {
            ctx.images.remove(&identifier).ok_or_else(|| {
                MovingImagesError::invalid_image_identifier(format!(
                    "no image '{identifier}' in the collection"
                ))
            })?;
            Ok(Reply::ok())
        }
        Command::Export { receiver, target } => export(ctx, &receiver, &target),
        Command::CreateTrack {
            receiver,
            media_type,
            track_id,
        } => {
            let id = with_receiver(ctx, &receiver, "createtrack", Object::editor, |e| {
                e.create_track(&media_type, track_id)
            })?;
            Ok(Reply::number(f64::from(id)))
        }
        Command::InsertSegment { receiver, insert } => insert_segment(ctx, &receiver, insert),
        Command::InsertEmptySegment {
            receiver,
            track,
            range,
        } => {
            with_receiver(ctx, &receiver, "insertemptytracksegment", Object::editor, |e| {
                e.insert_empty_segment(&track, &range)
            })?;
            Ok(Reply::ok())
        }
        Command::AddInstruction {
            receiver,
            instruction,
        } => {
            with_receiver(ctx, &receiver, "addmovieinstruction", Object::editor, |e| {
                e.add_instruction(instruction)
            })?;
            Ok(Reply::ok())
        }
        Command::AddWriterInput { receiver, input } => {
            with_receiver(ctx, &receiver, "addinputtowriter", Object::writer, |w| w.add_input(input))?;
            Ok(Reply::ok())
        }
        Command::AddImageSample { receiver, sample } => add_sample(ctx, &receiver, &sample),
        Command::FinishWriting(receiver) => {
            with_receiver(ctx, &receiver, "finishwritingframes", Object::writer, VideoFramesWriter::finish)?;
            Ok(Reply::ok())
        }
        Command::CancelWriting(receiver) => {
            with_receiver(ctx, &receiver, "cancelwritingframes", Object::writer, |w| {
                w.cancel();
                Ok(())
            })?;
            Ok(Reply::ok())
        }
        Command::ProcessFrames { receiver, process } => process::run(ctx, &receiver, process),
    }
}

/// Lock the receiver and hand it to `f` if it has the kind `pick` selects.
fn with_receiver<T, R>(
    ctx: &Context,
    selector: &Selector,
    verb: &str,
    pick: fn(&mut Object) -> Option<&mut T>,
    f: impl FnOnce(&mut T) -> MovingImagesResult<R>,
) -> MovingImagesResult<R> {
    let resolved = ctx.objects.resolve(selector)?;
    let mut object = lock(&resolved.handle);
    let kind = object.kind();
    match pick(&mut *object) {
        Some(target) => f(target),
        None => Err(MovingImagesError::invalid_receiver(format!(
            "'{verb}' cannot be sent to a {kind}"
        ))),
    }
}

fn create(ctx: &mut Context, name: Option<String>, kind: CreateKind) -> MovingImagesResult<Reply> {
    let object_type = kind.object_type();
    let object = match kind {
        CreateKind::Bitmap {
            width,
            height,
            preset,
        } => Object::Bitmap(BitmapContext::new(
            width,
            height,
            preset,
            ctx.config.max_bitmap_dimension,
        )?),
        CreateKind::Importer { path } => Object::Importer(MovieImporter::open(&*ctx.backend, &path)?),
        CreateKind::Editor => Object::Editor(MovieEditor::new()),
        CreateKind::Writer { path, file_type } => Object::Writer(VideoFramesWriter::new(path, file_type)),
    };
    let reference = ctx.objects.create(object_type, name, object);
    tracing::debug!(%object_type, reference, "created");
    Ok(Reply::number(reference as f64).with_string(reference.to_string()))
}

/// Snapshot every image a draw tree needs before the receiver is locked, so a bitmap may
/// draw itself.
fn draw(ctx: &Context, receiver: &Selector, element: &DrawElement) -> MovingImagesResult<Reply> {
    let mut images = ImageMap::new();
    for source in element.image_refs() {
        if images.contains_key(source) {
            continue;
        }
        let frame = image_for(ctx, source)?;
        images.insert(source.clone(), frame);
    }
    with_receiver(ctx, receiver, "drawelement", Object::bitmap, |b| b.draw(element, &images))?;
    Ok(Reply::ok())
}

fn image_for(ctx: &Context, source: &ImageRef) -> MovingImagesResult<Arc<FrameRGBA>> {
    match source {
        ImageRef::Identifier(id) => ctx.collection_image(id),
        ImageRef::Object(selector) => {
            let current = FrameGrab {
                time: FrameTime::Current,
                tracks: Vec::new(),
            };
            Ok(Arc::new(ctx.image_from_object(selector, &current)?))
        }
    }
}

fn export(ctx: &Context, receiver: &Selector, target: &ExportTarget) -> MovingImagesResult<Reply> {
    let resolved = ctx.objects.resolve(receiver)?;
    let mut object = lock(&resolved.handle);
    match &mut *object {
        Object::Bitmap(b) => {
            let file_type = ImageFileType::from_uti(&target.file_type)?;
            b.export(Path::new(&target.path), file_type, target.quality)?;
        }
        Object::Editor(e) => {
            let preset = target
                .preset
                .as_deref()
                .ok_or_else(|| MovingImagesError::invalid_parameter("movie export needs 'exportpreset'"))?;
            let request = ExportRequest {
                preset: preset.parse()?,
                file_type: MovieFileType::from_uti(&target.file_type)?,
                path: PathBuf::from(&target.path),
            };
            e.export(&*ctx.backend, &request)?;
        }
        other => {
            return Err(MovingImagesError::invalid_receiver(format!(
                "'export' cannot be sent to a {}",
                other.kind()
            )));
        }
    }
    Ok(Reply::ok())
}

fn insert_segment(ctx: &Context, receiver: &Selector, insert: SegmentInsert) -> MovingImagesResult<Reply> {
    let source = {
        let resolved = ctx.objects.resolve(&insert.source)?;
        let mut object = lock(&resolved.handle);
        let importer = object.importer().ok_or_else(|| {
            MovingImagesError::invalid_parameter(format!(
                "sourceobject must be a {}, got {}",
                ObjectType::MovieImporter,
                resolved.kind
            ))
        })?;
        let track = importer.track(&insert.source_track)?.clone();
        SegmentSource::new(importer.source(), track, &insert.source_range.start)?
    };
    let inserted = with_receiver(ctx, receiver, "inserttracksegment", Object::editor, |e| {
        let range = e.insert_segment(
            &insert.track,
            source,
            insert.source_range.duration,
            insert.insertion_time,
        )?;
        if insert.passthru {
            e.add_passthru(&insert.track, range)?;
        }
        Ok(range)
    })?;
    Ok(Reply::string(inserted.to_json_string()))
}

fn add_sample(ctx: &Context, receiver: &Selector, sample: &ImageSample) -> MovingImagesResult<Reply> {
    let frame = image_for(ctx, &sample.source)?;
    let duration = sample
        .duration_key
        .as_deref()
        .map(|key| MediaTime::from_json(ctx.variables.resolve(key)?))
        .transpose()?;
    let backend = Arc::clone(&ctx.backend);
    with_receiver(ctx, receiver, "addimagesampletowriter", Object::writer, |w| {
        w.add_sample(&*backend, &frame, sample.time, duration)
    })?;
    Ok(Reply::ok())
}

#[cfg(test)]
#[path = "../../tests/unit/dispatch.rs"]
mod tests;
