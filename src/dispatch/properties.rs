use serde_json::{Map, Value, json};

use crate::context::{Context, Object};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::graphics::bitmap::{BitmapContext, BitmapPreset};
use crate::graphics::codec::ImageFileType;
use crate::media::backend::MovieFileType;
use crate::media::track::{MEDIA_CHARACTERISTICS, MEDIA_TYPES, TrackSelector};
use crate::media::writer::WriterPreset;
use crate::protocol::command::PropertyQuery;
use crate::protocol::property::PropertyValue;
use crate::registry::{ObjectReference, ObjectType, Resolved, Selector, lock};

/// Receiver-less properties describing the context and what it supports.
pub(super) fn global(ctx: &Context, query: &PropertyQuery) -> MovingImagesResult<PropertyValue> {
    Ok(match query.key.as_str() {
        "version" => PropertyValue::str(crate::VERSION),
        "numberofobjects" => PropertyValue::int(ctx.objects.count(query.object_type) as i64),
        "numberofimagesincollection" => PropertyValue::int(ctx.images.len() as i64),
        "imageimportertypes" | "imageexportertypes" => PropertyValue::str(ImageFileType::list()),
        "movieimporttypes" => PropertyValue::str(ctx.backend.import_types().join(" ")),
        "movieimportmimetypes" => PropertyValue::str(ctx.backend.import_mime_types().join(" ")),
        "movieexporttypes" => PropertyValue::str(MovieFileType::list()),
        "movieexportpresets" => PropertyValue::str(ctx.backend.export_presets().join(" ")),
        "videowriterpresets" => PropertyValue::str(WriterPreset::list()),
        "bitmapcontextpresets" => PropertyValue::str(BitmapPreset::list()),
        "mediatypes" => PropertyValue::str(MEDIA_TYPES.join(" ")),
        "mediacharacteristics" => PropertyValue::str(MEDIA_CHARACTERISTICS.join(" ")),
        key => {
            return Err(MovingImagesError::invalid_property(format!(
                "no global property '{key}'"
            )));
        }
    })
}

/// One property of the object `selector` resolves to.
pub(super) fn object(
    ctx: &Context,
    selector: &Selector,
    query: &PropertyQuery,
) -> MovingImagesResult<PropertyValue> {
    let resolved = ctx.objects.resolve(selector)?;
    if query.track.is_none()
        && let Some(identity) = identity(&resolved, &query.key)
    {
        return Ok(identity);
    }
    let object = lock(&resolved.handle);
    match &*object {
        Object::Bitmap(b) if query.track.is_none() => b.property(&query.key),
        Object::Bitmap(_) => Err(MovingImagesError::invalid_property("bitmap contexts have no tracks")),
        Object::Importer(_) if query.key == "movieimporttypes" => {
            Ok(PropertyValue::str(ctx.backend.import_types().join(" ")))
        }
        Object::Importer(i) => i.property(query),
        Object::Editor(e) => e.property(query),
        Object::Writer(w) => w.property(&query.key),
    }
}

fn identity(resolved: &Resolved<Object>, key: &str) -> Option<PropertyValue> {
    Some(match key {
        "objecttype" => PropertyValue::str(resolved.kind.as_str()),
        "objectname" => PropertyValue::str(resolved.name.clone().unwrap_or_default()),
        "objectreference" => PropertyValue::int(resolved.reference as i64),
        _ => return None,
    })
}

/// `getproperties`: the whole object, or one of its tracks.
pub(super) fn dictionary(
    ctx: &Context,
    selector: &Selector,
    track: Option<&TrackSelector>,
) -> MovingImagesResult<Map<String, Value>> {
    let resolved = ctx.objects.resolve(selector)?;
    let name = resolved.name.clone().unwrap_or_default();
    let object = lock(&resolved.handle);
    match (&*object, track) {
        (Object::Bitmap(b), None) => Ok(bitmap_dictionary(b, &name, resolved.reference)),
        (Object::Importer(i), None) => Ok(i.properties(&name, resolved.reference)),
        (Object::Importer(i), Some(t)) => i.track_properties(t),
        (Object::Editor(e), None) => Ok(e.properties(&name, resolved.reference)),
        (Object::Editor(e), Some(t)) => e.track_properties(t),
        (Object::Writer(w), None) => Ok(w.properties(&name)),
        (other, Some(_)) => Err(MovingImagesError::invalid_property(format!(
            "a {} has no tracks",
            other.kind()
        ))),
    }
}

fn bitmap_dictionary(b: &BitmapContext, name: &str, reference: ObjectReference) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("objecttype".into(), json!(ObjectType::BitmapContext.as_str()));
    m.insert("objectname".into(), json!(name));
    m.insert("objectreference".into(), json!(reference));
    for key in BitmapContext::PROPERTY_KEYS {
        if let Ok(v) = b.property(key) {
            m.insert(key.to_owned(), v.to_json());
        }
    }
    m
}
