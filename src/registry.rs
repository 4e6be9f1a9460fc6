//! Context-scoped object table: integer references plus optional (type, name) bindings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{MovingImagesError, MovingImagesResult};

/// Integer handle assigned at creation, monotonically per context starting at 0.
pub type ObjectReference = u64;

/// Kinds of object a context can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    /// CPU bitmap drawing surface.
    BitmapContext,
    /// Read-only movie file.
    MovieImporter,
    /// Editable track composition.
    MovieEditor,
    /// Encoder fed with still frames.
    VideoFramesWriter,
}

impl ObjectType {
    /// All object types, in wire-name order used for listings.
    pub const ALL: [ObjectType; 4] = [
        ObjectType::BitmapContext,
        ObjectType::MovieImporter,
        ObjectType::MovieEditor,
        ObjectType::VideoFramesWriter,
    ];

    /// Wire name (`bitmapcontext`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BitmapContext => "bitmapcontext",
            Self::MovieImporter => "movieimporter",
            Self::MovieEditor => "movieeditor",
            Self::VideoFramesWriter => "videoframeswriter",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = MovingImagesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MovingImagesError::invalid_object_type(format!("unknown object type '{s}'")))
    }
}

/// How a command names its receiver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Selector {
    /// `{"objectreference": n}`.
    ByReference(ObjectReference),
    /// `{"objecttype": t, "objectname": n}`.
    ByTypeName(ObjectType, String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByReference(r) => write!(f, "object reference {r}"),
            Self::ByTypeName(t, n) => write!(f, "{t} named '{n}'"),
        }
    }
}

pub(crate) type Shared<T> = Arc<Mutex<T>>;

/// Lock a shared object. A panic inside an earlier command does not poison the context.
pub(crate) fn lock<T>(shared: &Shared<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<T> {
    kind: ObjectType,
    name: Option<String>,
    handle: Shared<T>,
}

/// A resolved registry entry.
pub(crate) struct Resolved<T> {
    pub(crate) reference: ObjectReference,
    pub(crate) kind: ObjectType,
    pub(crate) name: Option<String>,
    pub(crate) handle: Shared<T>,
}

pub(crate) struct Registry<T> {
    next: ObjectReference,
    entries: BTreeMap<ObjectReference, Entry<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub(crate) fn create(
        &mut self,
        kind: ObjectType,
        name: Option<String>,
        handle: T,
    ) -> ObjectReference {
        let reference = self.next;
        self.next += 1;
        self.entries.insert(
            reference,
            Entry {
                kind,
                name,
                handle: Arc::new(Mutex::new(handle)),
            },
        );
        reference
    }

    fn find(&self, selector: &Selector) -> Option<ObjectReference> {
        match selector {
            Selector::ByReference(r) => self.entries.contains_key(r).then_some(*r),
            // References are monotonic, so the last match is the newest object.
            Selector::ByTypeName(kind, name) => self
                .entries
                .iter()
                .rev()
                .find(|(_, e)| e.kind == *kind && e.name.as_deref() == Some(name.as_str()))
                .map(|(r, _)| *r),
        }
    }

    pub(crate) fn resolve(&self, selector: &Selector) -> MovingImagesResult<Resolved<T>> {
        let reference = self
            .find(selector)
            .ok_or_else(|| MovingImagesError::invalid_receiver(format!("no live {selector}")))?;
        let e = &self.entries[&reference];
        Ok(Resolved {
            reference,
            kind: e.kind,
            name: e.name.clone(),
            handle: Arc::clone(&e.handle),
        })
    }

    pub(crate) fn close(&mut self, selector: &Selector) -> MovingImagesResult<ObjectType> {
        let reference = self
            .find(selector)
            .ok_or_else(|| MovingImagesError::invalid_receiver(format!("no live {selector}")))?;
        let e = self
            .entries
            .remove(&reference)
            .ok_or_else(|| MovingImagesError::invalid_receiver(format!("no live {selector}")))?;
        Ok(e.kind)
    }

    pub(crate) fn count(&self, kind: Option<ObjectType>) -> usize {
        match kind {
            None => self.entries.len(),
            Some(k) => self.entries.values().filter(|e| e.kind == k).count(),
        }
    }

    /// Drop every object, or only those of `kind`. Returns how many were closed.
    pub(crate) fn close_all(&mut self, kind: Option<ObjectType>) -> usize {
        let before = self.entries.len();
        match kind {
            None => self.entries.clear(),
            Some(k) => self.entries.retain(|_, e| e.kind != k),
        }
        before - self.entries.len()
    }
}

#[cfg(test)]
#[path = "../tests/unit/registry.rs"]
mod tests;
