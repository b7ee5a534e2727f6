//! Dependency keys for cache storage and lookup
//!
//! A [`Key`] identifies a requested dependency: a runtime type descriptor,
//! an optional qualifier name, and a shape (plain, collection, or array).
//! Keys differing in any of the three are distinct cache entries.

use crate::factory::{assemble_array, assemble_collection, AssembleFn};
use crate::registry::Injectable;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime descriptor of a type: its `TypeId` plus its name for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Describe a type
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The described type's `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The described type's name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// How a key's value is shaped.
///
/// Collection and array keys carry a monomorphized assemble function that
/// turns constructed elements into the typed aggregate. The function is
/// derived from the element type, so it takes no part in key identity.
#[derive(Clone, Copy)]
pub(crate) enum Shape {
    One,
    Collection(AssembleFn),
    Array(AssembleFn),
}

impl Shape {
    fn tag(&self) -> u8 {
        match self {
            Shape::One => 0,
            Shape::Collection(_) => 1,
            Shape::Array(_) => 2,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::One => f.write_str("One"),
            Shape::Collection(_) => f.write_str("Collection"),
            Shape::Array(_) => f.write_str("Array"),
        }
    }
}

/// Identity of a requested dependency.
///
/// Equality and hashing are structural over (shape, type, qualifier). The
/// type descriptor of a collection or array key is the *element* type;
/// [`Key::element`] exposes it.
///
/// # Examples
///
/// ```
/// use plugin_injector::Key;
///
/// struct Config;
///
/// let plain = Key::of::<Config>();
/// let named = Key::of::<Config>().named("test");
/// assert_ne!(plain, named);
/// assert_ne!(plain, Key::collection::<Config>());
/// ```
#[derive(Debug, Clone)]
pub struct Key {
    ty: TypeInfo,
    qualifier: Option<&'static str>,
    shape: Shape,
}

impl Key {
    /// Key for a plain type
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            ty: TypeInfo::of::<T>(),
            qualifier: None,
            shape: Shape::One,
        }
    }

    /// Key for an ordered collection of all discovered implementations of `T`
    #[inline]
    pub fn collection<T: Injectable>() -> Self {
        Self {
            ty: TypeInfo::of::<T>(),
            qualifier: None,
            shape: Shape::Collection(assemble_collection::<T>),
        }
    }

    /// Key for a fixed-size array of all discovered implementations of `T`
    #[inline]
    pub fn array<T: Injectable>() -> Self {
        Self {
            ty: TypeInfo::of::<T>(),
            qualifier: None,
            shape: Shape::Array(assemble_array::<T>),
        }
    }

    /// Qualify this key with a name
    #[inline]
    pub fn named(mut self, qualifier: &'static str) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// The key's type descriptor (the element type for shaped keys)
    #[inline]
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// The subject type's name
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.name
    }

    /// The qualifier, if any
    #[inline]
    pub fn qualifier(&self) -> Option<&'static str> {
        self.qualifier
    }

    /// Whether this key denotes a collection of implementations
    #[inline]
    pub fn is_collection(&self) -> bool {
        matches!(self.shape, Shape::Collection(_))
    }

    /// Whether this key denotes an array of implementations
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.shape, Shape::Array(_))
    }

    /// The element type of a collection or array key, `None` for plain keys
    #[inline]
    pub fn element(&self) -> Option<TypeInfo> {
        match self.shape {
            Shape::One => None,
            Shape::Collection(_) | Shape::Array(_) => Some(self.ty),
        }
    }

    pub(crate) fn assemble(&self) -> Option<AssembleFn> {
        match self.shape {
            Shape::One => None,
            Shape::Collection(f) | Shape::Array(f) => Some(f),
        }
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.shape.tag() == other.shape.tag()
            && self.ty.id == other.ty.id
            && self.qualifier == other.qualifier
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.tag().hash(state);
        self.ty.id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key<")?;
        match self.shape {
            Shape::One => {}
            Shape::Collection(_) => f.write_str("collection of ")?,
            Shape::Array(_) => f.write_str("array of ")?,
        }
        f.write_str(self.ty.name)?;
        if let Some(qualifier) = self.qualifier {
            write!(f, " named \"{}\"", qualifier)?;
        }
        f.write_str(">")
    }
}
