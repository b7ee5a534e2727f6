//! The resolution engine
//!
//! The `Resolver` owns a per-instance cache of key -> memoized instance,
//! the binding tables fixed at build time, a shared registry, and an
//! optional parent. Resolution walks an ordered strategy, first match wins:
//!
//! 1. an entry already cached for the exact key (instance and explicit
//!    implementation bindings are pre-seeded here at build time)
//! 2. collection/array shape: construct every discovered implementation of
//!    the element type, in discovery order
//! 3. the singular plugin advertised for the type
//! 4. this resolver's default-fallback binding
//! 5. an auto-factory contract (wins over a plugin or default match)
//! 6. the type's own registered constructors (concrete types implement
//!    themselves, overriding plugin and default choices, and never
//!    delegate upward)
//! 7. full delegation of the key to the parent resolver
//! 8. failure, naming the requested key
//!
//! All calls are idempotent: for a given resolver and key, every successful
//! `get` returns the identical `Arc`.

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::factory::{downcast_instance, AnyInstance, InstanceSource, Memo};
use crate::key::Key;
use crate::registry::{Impl, Injectable, PluginSource, Registry};
use crate::scope::FactoryScope;
use crate::storage::ProviderCache;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

thread_local! {
    /// Keys currently being resolved on this thread, per resolver identity.
    /// A repeat entry means a dependency cycle; failing fast here beats
    /// deadlocking the entry's cell.
    static IN_FLIGHT: RefCell<Vec<(usize, Key)>> = const { RefCell::new(Vec::new()) };
}

struct CycleGuard;

impl CycleGuard {
    fn enter(resolver_id: usize, key: &Key) -> Result<Self> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack
                .iter()
                .any(|(id, pending)| *id == resolver_id && pending == key)
            {
                return Err(Error::CircularDependency {
                    type_name: key.type_name(),
                });
            }
            stack.push((resolver_id, key.clone()));
            Ok(CycleGuard)
        })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) struct ResolverCore {
    pub(crate) parent: Option<Resolver>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) discovery: Arc<dyn PluginSource>,
    pub(crate) defaults: HashMap<Key, Impl>,
    pub(crate) cache: ProviderCache,
}

/// The injector core: lazy, memoized, thread-safe dependency resolution.
///
/// Cheap to clone — clones share the same cache and bindings. Binding
/// tables are fixed at build time; the cache grows lazily and is never
/// invalidated.
///
/// # Examples
///
/// ```
/// use plugin_injector::Builder;
///
/// struct Config {
///     url: String,
/// }
///
/// let resolver = Builder::new()
///     .bind(Config { url: "localhost".into() })
///     .build();
///
/// let config = resolver.get::<Config>().unwrap();
/// assert_eq!(config.url, "localhost");
/// ```
#[derive(Clone)]
pub struct Resolver {
    core: Arc<ResolverCore>,
}

impl Resolver {
    pub(crate) fn from_core(core: ResolverCore) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Start building a root resolver
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Start building a child resolver delegating to this one.
    ///
    /// The child inherits this resolver's registry and plugin source unless
    /// the builder overrides them.
    pub fn scope(&self) -> Builder {
        Builder::new().parent(self.clone())
    }

    /// Start a per-call factory scope (see [`FactoryScope`])
    pub fn factory_scope(&self) -> FactoryScope {
        FactoryScope::new(self)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve an instance of `T`.
    ///
    /// Returns `Arc<T>` for zero-copy sharing; repeated calls return the
    /// identical `Arc`.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        let key = Key::of::<T>();
        let value = self.resolve_key(&key)?;
        downcast_instance::<T>(&key, value)
    }

    /// Resolve an instance of `T` under a qualifier name
    pub fn get_named<T: Injectable>(&self, qualifier: &'static str) -> Result<Arc<T>> {
        let key = Key::of::<T>().named(qualifier);
        let value = self.resolve_key(&key)?;
        downcast_instance::<T>(&key, value)
    }

    /// Resolve the ordered collection of every advertised implementation of
    /// `T`, constructed in discovery order.
    ///
    /// The collection is assembled once and shared; it is immutable through
    /// the returned handle.
    pub fn get_all<T: Injectable>(&self) -> Result<Arc<Vec<Arc<T>>>> {
        let key = Key::collection::<T>();
        let value = self.resolve_key(&key)?;
        value.downcast::<Vec<Arc<T>>>().map_err(|_| Error::WrongType {
            key,
            expected: std::any::type_name::<Vec<Arc<T>>>(),
        })
    }

    /// Like [`Resolver::get_all`], but as a fixed-size boxed slice
    pub fn get_array<T: Injectable>(&self) -> Result<Arc<Box<[Arc<T>]>>> {
        let key = Key::array::<T>();
        let value = self.resolve_key(&key)?;
        value
            .downcast::<Box<[Arc<T>]>>()
            .map_err(|_| Error::WrongType {
                key,
                expected: std::any::type_name::<Box<[Arc<T>]>>(),
            })
    }

    /// Resolve, returning `None` when no implementation can be determined
    pub fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Qualified variant of [`Resolver::try_get`]
    pub fn try_get_named<T: Injectable>(&self, qualifier: &'static str) -> Option<Arc<T>> {
        self.get_named::<T>(qualifier).ok()
    }

    /// Resolve an erased instance for a key.
    ///
    /// The cache-population path: find or create the key's memo, then let
    /// the memo realize it. A key whose strategy fails outright is not
    /// inserted, so a later call re-runs the full strategy.
    pub(crate) fn resolve_key(&self, key: &Key) -> Result<AnyInstance> {
        let _guard = CycleGuard::enter(Arc::as_ptr(&self.core) as usize, key)?;

        let memo = match self.core.cache.get(key) {
            Some(memo) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "plugin_injector",
                    key = %key,
                    "Key already cached"
                );
                memo
            }
            None => {
                let source = self.strategy(key)?;
                self.core.cache.get_or_insert(key.clone(), Memo::new(source))
            }
        };

        memo.get(self)
    }

    /// The ordered strategy for a key not yet in the cache
    fn strategy(&self, key: &Key) -> Result<InstanceSource> {
        if key.is_collection() || key.is_array() {
            #[cfg(feature = "logging")]
            trace!(
                target: "plugin_injector",
                key = %key,
                "Resolving as plugin collection"
            );
            return Ok(InstanceSource::Collect(key.clone()));
        }

        let ty = key.type_info();
        let mut implementation = self.core.discovery.find_plugin(&ty);

        #[cfg(feature = "logging")]
        if let Some(found) = &implementation {
            trace!(
                target: "plugin_injector",
                key = %key,
                implementation = found.name(),
                "Plugin implementation advertised"
            );
        }

        if implementation.is_none() {
            implementation = self.core.defaults.get(key).cloned();

            #[cfg(feature = "logging")]
            if let Some(fallback) = &implementation {
                trace!(
                    target: "plugin_injector",
                    key = %key,
                    implementation = fallback.name(),
                    "Using default-fallback implementation"
                );
            }
        }

        // An auto-factory contract wins over a plugin or default match
        if let Some(provider) = self.core.registry.auto_factory(ty.id()) {
            #[cfg(feature = "logging")]
            debug!(
                target: "plugin_injector",
                key = %key,
                "Producing auto-factory handle"
            );
            return Ok(InstanceSource::Factory(provider.clone()));
        }

        // A concrete type implements itself, overriding any plugin or
        // default choice, and never delegates upward
        if let Some(own) = self.core.registry.constructible(ty.id()) {
            implementation = Some(own.clone());
        }

        match implementation {
            Some(chosen) => Ok(InstanceSource::Construct(chosen)),
            None if self.core.parent.is_some() => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "plugin_injector",
                    key = %key,
                    "Unresolved locally, delegating to parent"
                );
                Ok(InstanceSource::Delegate(key.clone()))
            }
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "plugin_injector",
                    key = %key,
                    "No implementation found"
                );
                Err(Error::NoImplementation { key: key.clone() })
            }
        }
    }

    /// Realize a memo's deferred source
    pub(crate) fn realize(&self, source: &InstanceSource) -> Result<AnyInstance> {
        match source {
            InstanceSource::Ready(value) => Ok(value.clone()),
            InstanceSource::Construct(implementation) => self.instantiate(implementation),
            InstanceSource::Collect(key) => self.collect(key),
            InstanceSource::Factory(provider) => Ok(provider(self)),
            InstanceSource::Delegate(key) => match &self.core.parent {
                Some(parent) => parent.resolve_key(key),
                None => Err(Error::NoImplementation { key: key.clone() }),
            },
        }
    }

    /// Instantiate a chosen implementation: select a constructor, then run
    /// it against a recursive injection context.
    pub(crate) fn instantiate(&self, implementation: &Impl) -> Result<AnyInstance> {
        let constructor = implementation.select()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            implementation = implementation.name(),
            "Constructing instance"
        );

        let deps = Deps {
            resolver: self.clone(),
            target: implementation.name(),
        };

        constructor.build(&deps).map_err(|error| match error {
            chained @ Error::ParameterResolution { .. } => chained,
            tagged @ Error::ConstructionFailed { .. } => tagged,
            other => Error::ConstructionFailed {
                type_name: implementation.name(),
                reason: other.to_string(),
            },
        })
    }

    /// Construct every advertised implementation of the key's element type
    /// and assemble them in discovery order
    fn collect(&self, key: &Key) -> Result<AnyInstance> {
        let (element, assemble) = match (key.element(), key.assemble()) {
            (Some(element), Some(assemble)) => (element, assemble),
            _ => return Err(Error::NoImplementation { key: key.clone() }),
        };

        let implementations = self.core.discovery.find_plugins(&element);

        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            key = %key,
            candidates = implementations.len(),
            "Constructing plugin collection"
        );

        let mut items = Vec::with_capacity(implementations.len());
        for implementation in &implementations {
            items.push(self.instantiate(implementation)?);
        }
        assemble(items)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Whether this resolver has a parent
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.core.parent.is_some()
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.core.registry
    }

    pub(crate) fn plugin_source(&self) -> &Arc<dyn PluginSource> {
        &self.core.discovery
    }

    /// Number of keys cached so far on this resolver
    #[inline]
    pub fn cached_keys(&self) -> usize {
        self.core.cache.len()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.core.cache)
            .field("has_parent", &self.core.parent.is_some())
            .finish()
    }
}

/// Recursive injection context handed to registered constructors.
///
/// Every resolution failure through this handle is wrapped with the key
/// being injected and the type under construction, so the final error
/// exposes the full dependency path.
pub struct Deps {
    resolver: Resolver,
    target: &'static str,
}

impl Deps {
    /// Resolve a constructor parameter
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.wrap(Key::of::<T>(), self.resolver.get::<T>())
    }

    /// Resolve a qualified constructor parameter
    pub fn get_named<T: Injectable>(&self, qualifier: &'static str) -> Result<Arc<T>> {
        self.wrap(
            Key::of::<T>().named(qualifier),
            self.resolver.get_named::<T>(qualifier),
        )
    }

    /// Resolve a collection-of-implementations parameter
    pub fn get_all<T: Injectable>(&self) -> Result<Arc<Vec<Arc<T>>>> {
        self.wrap(Key::collection::<T>(), self.resolver.get_all::<T>())
    }

    /// Resolve an array-of-implementations parameter
    pub fn get_array<T: Injectable>(&self) -> Result<Arc<Box<[Arc<T>]>>> {
        self.wrap(Key::array::<T>(), self.resolver.get_array::<T>())
    }

    fn wrap<T>(&self, key: Key, outcome: Result<T>) -> Result<T> {
        outcome.map_err(|error| Error::ParameterResolution {
            key,
            target: self.target,
            source: Box::new(error),
        })
    }
}
