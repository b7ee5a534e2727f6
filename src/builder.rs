//! Configuration of resolvers
//!
//! A [`Builder`] collects bindings and produces an immutable-structure
//! [`Resolver`]: binding tables fixed for the resolver's lifetime, cache
//! pre-seeded only with memoized wrappers for the instance and explicit
//! implementation bindings supplied here.

use crate::factory::{InstanceSource, Memo};
use crate::key::Key;
use crate::registry::{Impl, Injectable, PluginSource, Registry};
use crate::resolver::{Resolver, ResolverCore};
use crate::storage::ProviderCache;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

type Instance = Arc<dyn std::any::Any + Send + Sync>;

/// Builder for [`Resolver`].
///
/// # Examples
///
/// ```
/// use plugin_injector::Builder;
///
/// struct Database {
///     url: String,
/// }
///
/// let resolver = Builder::new()
///     .bind(Database { url: "postgres://localhost".into() })
///     .bind_named("replica", Database { url: "postgres://replica".into() })
///     .build();
///
/// assert_eq!(resolver.get::<Database>().unwrap().url, "postgres://localhost");
/// assert_eq!(
///     resolver.get_named::<Database>("replica").unwrap().url,
///     "postgres://replica"
/// );
/// ```
#[derive(Default)]
pub struct Builder {
    parent: Option<Resolver>,
    registry: Option<Arc<Registry>>,
    discovery: Option<Arc<dyn PluginSource>>,
    instances: Vec<(Key, Instance)>,
    implementations: Vec<(Key, Impl)>,
    defaults: HashMap<Key, Impl>,
}

impl Builder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate keys this resolver cannot satisfy to `parent`.
    ///
    /// Unless overridden, the built resolver also inherits the parent's
    /// registry and plugin source.
    pub fn parent(mut self, parent: Resolver) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Use `registry` for constructible types, builtins, and auto-factory
    /// contracts. Also serves as the plugin source unless one is set.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Swap in a custom plugin-discovery backend
    pub fn plugin_source(mut self, source: Arc<dyn PluginSource>) -> Self {
        self.discovery = Some(source);
        self
    }

    /// Bind a type to an already-built value
    pub fn bind<T: Injectable>(self, value: T) -> Self {
        self.bind_instance(Key::of::<T>(), Arc::new(value))
    }

    /// Bind a type + qualifier key to an already-built value
    pub fn bind_named<T: Injectable>(self, qualifier: &'static str, value: T) -> Self {
        self.bind_instance(Key::of::<T>().named(qualifier), Arc::new(value))
    }

    /// Bind a type to a shared value without re-wrapping it
    pub fn bind_arc<T: Injectable>(self, value: Arc<T>) -> Self {
        self.bind_instance(Key::of::<T>(), value)
    }

    /// Qualified variant of [`Builder::bind_arc`]
    pub fn bind_named_arc<T: Injectable>(self, qualifier: &'static str, value: Arc<T>) -> Self {
        self.bind_instance(Key::of::<T>().named(qualifier), value)
    }

    fn bind_instance(mut self, key: Key, value: Instance) -> Self {
        self.instances.push((key, value));
        self
    }

    /// Bind a type to an implementation to construct on demand
    pub fn bind_impl<T: 'static>(mut self, implementation: Impl) -> Self {
        self.implementations
            .push((Key::of::<T>(), implementation));
        self
    }

    /// Bind a type + qualifier key to an implementation to construct
    pub fn bind_named_impl<T: 'static>(
        mut self,
        qualifier: &'static str,
        implementation: Impl,
    ) -> Self {
        self.implementations
            .push((Key::of::<T>().named(qualifier), implementation));
        self
    }

    /// Register a fallback implementation, used only when no plugin matches
    pub fn bind_default<T: 'static>(mut self, implementation: Impl) -> Self {
        self.defaults.insert(Key::of::<T>(), implementation);
        self
    }

    /// Build the resolver as previously configured
    pub fn build(self) -> Resolver {
        let registry = self
            .registry
            .or_else(|| self.parent.as_ref().map(|p| p.registry().clone()))
            .unwrap_or_default();
        let discovery = self
            .discovery
            .or_else(|| {
                self.parent
                    .as_ref()
                    .map(|p| Arc::clone(p.plugin_source()))
            })
            .unwrap_or_else(|| -> Arc<dyn PluginSource> { registry.clone() });

        let cache = ProviderCache::new();
        for (key, value) in self.instances {
            cache.seed(key, Memo::ready(value));
        }
        for (key, implementation) in self.implementations {
            cache.seed(key, Memo::new(InstanceSource::Construct(implementation)));
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            seeded = cache.len(),
            defaults = self.defaults.len(),
            has_parent = self.parent.is_some(),
            "Building resolver"
        );

        Resolver::from_core(ResolverCore {
            parent: self.parent,
            registry,
            discovery,
            defaults: self.defaults,
            cache,
        })
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("instances", &self.instances.len())
            .field("implementations", &self.implementations.len())
            .field("defaults", &self.defaults.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
