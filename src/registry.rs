//! Explicit registration of constructible types, plugins, and contracts
//!
//! There is no reflection here: every constructible type registers its
//! constructor functions up front, implementations advertise themselves for
//! the abstract types they serve, and builtin types are declared as such.
//! The [`Registry`] is populated before any resolver is built and shared,
//! frozen, by the whole resolver tree. It also acts as the default
//! [`PluginSource`].

use crate::error::{Error, Result};
use crate::factory::AnyInstance;
use crate::key::TypeInfo;
use crate::resolver::{Deps, Resolver};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Marker trait for values the resolver can produce.
///
/// Automatically implemented for every `Send + Sync + 'static` type; never
/// implement it manually.
pub trait Injectable: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Injectable for T {}

/// A registered constructor function, type-erased
pub(crate) type BuildFn = Arc<dyn Fn(&Deps) -> Result<AnyInstance> + Send + Sync>;

/// Produces an auto-factory handle bound to the enclosing resolver
pub(crate) type FactoryFn = Arc<dyn Fn(&Resolver) -> AnyInstance + Send + Sync>;

/// A constructor function for an implementation type.
///
/// The closure receives a [`Deps`] handle for resolving the constructor's
/// parameters and returns the constructed value. Mark a constructor to make
/// it win over any number of unmarked ones.
#[derive(Clone)]
pub struct Constructor {
    marked: bool,
    build: BuildFn,
}

impl Constructor {
    /// Register a constructor producing `T`
    pub fn new<T, F>(build: F) -> Self
    where
        T: Injectable,
        F: Fn(&Deps) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            marked: false,
            build: Arc::new(move |deps| Ok(Arc::new(build(deps)?) as AnyInstance)),
        }
    }

    /// Flag this constructor as the injection-selected one
    pub fn marked(mut self) -> Self {
        self.marked = true;
        self
    }

    pub(crate) fn build(&self, deps: &Deps) -> Result<AnyInstance> {
        (self.build)(deps)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("marked", &self.marked)
            .finish()
    }
}

/// An implementation type: its identity plus its registered constructors.
///
/// When advertised as a plugin for an abstract type, the constructors must
/// produce the *abstract* value (the coercion a language with subtyping
/// would perform implicitly lives in the registration closure):
///
/// ```
/// use plugin_injector::{Constructor, Impl};
///
/// trait Codec: Send + Sync {}
/// struct JsonCodec;
/// impl Codec for JsonCodec {}
///
/// let implementation = Impl::of::<JsonCodec>()
///     .with(Constructor::new(|_| Ok(Box::new(JsonCodec) as Box<dyn Codec>)));
/// assert!(implementation.name().contains("JsonCodec"));
/// ```
#[derive(Clone)]
pub struct Impl {
    ty: TypeInfo,
    constructors: Vec<Constructor>,
    builtin: bool,
}

impl Impl {
    /// Describe implementation type `C`
    pub fn of<C: Injectable>() -> Self {
        Self {
            ty: TypeInfo::of::<C>(),
            constructors: Vec::new(),
            builtin: false,
        }
    }

    /// Add a constructor
    pub fn with(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    fn builtin_of<C: Injectable>() -> Self {
        Self {
            ty: TypeInfo::of::<C>(),
            constructors: Vec::new(),
            builtin: true,
        }
    }

    /// The implementation type's name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    #[inline]
    pub(crate) fn type_id(&self) -> TypeId {
        self.ty.id()
    }

    /// Select the constructor to invoke.
    ///
    /// Exactly one marked constructor wins outright; otherwise a single
    /// unmarked one is used. Builtins never construct — they must arrive
    /// through instance bindings.
    pub(crate) fn select(&self) -> Result<&Constructor> {
        let mut marked = self.constructors.iter().filter(|c| c.marked);
        let mut unmarked = self.constructors.iter().filter(|c| !c.marked);

        if let Some(chosen) = marked.next() {
            if marked.next().is_some() {
                return Err(Error::AmbiguousConstructor {
                    type_name: self.ty.name(),
                    kind: "marked",
                });
            }
            return Ok(chosen);
        }

        match (unmarked.next(), unmarked.next()) {
            (Some(_), Some(_)) if !self.builtin => Err(Error::AmbiguousConstructor {
                type_name: self.ty.name(),
                kind: "public",
            }),
            (Some(chosen), None) => Ok(chosen),
            _ if self.builtin => Err(Error::NothingProvided {
                type_name: self.ty.name(),
            }),
            _ => Err(Error::NoConstructor {
                type_name: self.ty.name(),
            }),
        }
    }
}

impl std::fmt::Debug for Impl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Impl")
            .field("type_name", &self.ty.name())
            .field("constructors", &self.constructors.len())
            .field("builtin", &self.builtin)
            .finish()
    }
}

/// The discovery interface the resolver consumes.
///
/// `find_plugin` must return at most one implementation; the source is
/// responsible for that uniqueness. `find_plugins` order is significant:
/// collection and array resolution constructs candidates in this order.
pub trait PluginSource: Send + Sync {
    /// The singular advertised implementation of an abstract type, if any
    fn find_plugin(&self, ty: &TypeInfo) -> Option<Impl>;

    /// All advertised implementations of an abstract type, in discovery order
    fn find_plugins(&self, ty: &TypeInfo) -> Vec<Impl>;
}

/// Static registration store: constructible types, plugin advertisements,
/// builtin declarations, and auto-factory contracts.
///
/// Populate it with package-level registration calls before building any
/// resolver, then freeze it in an `Arc`.
#[derive(Default)]
pub struct Registry {
    constructibles: HashMap<TypeId, Impl>,
    plugins: HashMap<TypeId, Vec<Impl>>,
    auto_factories: HashMap<TypeId, FactoryFn>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete type's own constructors.
    ///
    /// A type registered here is treated as concrete by the resolution
    /// strategy: it implements itself, overriding plugin and default-fallback
    /// choices, and it never delegates to a parent resolver.
    pub fn register(&mut self, implementation: Impl) {
        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            implementation = implementation.name(),
            constructors = implementation.constructors.len(),
            "Registering constructible type"
        );

        self.constructibles
            .insert(implementation.type_id(), implementation);
    }

    /// Advertise an implementation of abstract type `A`.
    ///
    /// The implementation's constructors must produce an `A`. Repeated calls
    /// append, and advertisement order is the discovery order used for
    /// collection and array resolution.
    pub fn register_plugin<A: 'static>(&mut self, implementation: Impl) {
        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            abstract_type = std::any::type_name::<A>(),
            implementation = implementation.name(),
            "Advertising plugin implementation"
        );

        self.plugins
            .entry(TypeId::of::<A>())
            .or_default()
            .push(implementation);
    }

    /// Declare `T` a builtin type: never constructible, instance bindings
    /// only. Resolving it without a binding fails with "nothing provided".
    pub fn register_builtin<T: Injectable>(&mut self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            builtin = std::any::type_name::<T>(),
            "Declaring builtin type"
        );

        self.constructibles
            .insert(TypeId::of::<T>(), Impl::builtin_of::<T>());
    }

    /// Register `F` as an auto-factory contract.
    ///
    /// The provider receives the enclosing resolver and returns the handle
    /// value implementing the contract; each handle method builds a per-call
    /// child resolver through [`Resolver::factory_scope`].
    pub fn register_auto_factory<F, P>(&mut self, provider: P)
    where
        F: Injectable,
        P: Fn(Resolver) -> F + Send + Sync + 'static,
    {
        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            contract = std::any::type_name::<F>(),
            "Registering auto-factory contract"
        );

        self.auto_factories.insert(
            TypeId::of::<F>(),
            Arc::new(move |resolver| Arc::new(provider(resolver.clone())) as AnyInstance),
        );
    }

    pub(crate) fn constructible(&self, id: TypeId) -> Option<&Impl> {
        self.constructibles.get(&id)
    }

    pub(crate) fn auto_factory(&self, id: TypeId) -> Option<&FactoryFn> {
        self.auto_factories.get(&id)
    }
}

impl PluginSource for Registry {
    fn find_plugin(&self, ty: &TypeInfo) -> Option<Impl> {
        match self.plugins.get(&ty.id()).map(Vec::as_slice) {
            Some([only]) => Some(only.clone()),
            // zero or several advertisements: no singular match; several are
            // still reachable through collection and array keys
            _ => None,
        }
    }

    fn find_plugins(&self, ty: &TypeInfo) -> Vec<Impl> {
        self.plugins.get(&ty.id()).cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("constructibles", &self.constructibles.len())
            .field("plugins", &self.plugins.len())
            .field("auto_factories", &self.auto_factories.len())
            .finish()
    }
}
