//! # Plugin Injector - Lazy, Plugin-Aware Dependency Injection for Rust
//!
//! A small, embeddable object-graph resolver: ask for an abstract type
//! (optionally qualified by a name) and get back a concrete instance —
//! lazily, memoized, and thread-safely — with transitive constructor
//! dependencies resolved recursively. Implementations are wired up at
//! runtime through explicit registration rather than hard-coded at compile
//! time.
//!
//! ## Features
//!
//! - 🔌 **Plugin discovery** - abstract types resolve to advertised
//!   implementations, singly or as ordered collections
//! - 🏭 **Lazy memoization** - every key is constructed at most once per
//!   resolver and shared as `Arc<T>`
//! - 🔒 **Thread-safe** - sharded cache, per-key construction locking
//! - 🔄 **Scoped resolvers** - parent delegation plus per-call factory
//!   scopes for auto-factory contracts
//! - 🧭 **Qualified keys** - multiple named bindings for the same type
//! - 📊 **Observable** - optional tracing integration with JSON or pretty
//!   output
//!
//! ## Quick Start
//!
//! ```rust
//! use plugin_injector::{Builder, Constructor, Deps, Impl, Registry};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!     name: String,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         format!("Hello, {}!", self.name)
//!     }
//! }
//!
//! // Registration happens once, before any resolver is built. The closure
//! // performs the trait coercion a reflective injector would get from
//! // subtyping.
//! let mut registry = Registry::new();
//! registry.register_plugin::<Box<dyn Greeter>>(Impl::of::<EnglishGreeter>().with(
//!     Constructor::new(|deps: &Deps| {
//!         Ok(Box::new(EnglishGreeter {
//!             name: deps.get::<String>()?.as_ref().clone(),
//!         }) as Box<dyn Greeter>)
//!     }),
//! ));
//!
//! let resolver = Builder::new()
//!     .registry(Arc::new(registry))
//!     .bind(String::from("world"))
//!     .build();
//!
//! let greeter = resolver.get::<Box<dyn Greeter>>().unwrap();
//! assert_eq!(greeter.greet(), "Hello, world!");
//! ```
//!
//! ## Resolution Strategy
//!
//! When a key is requested, the resolver uses the first match among:
//!
//! * An entry already cached for the exact key. Instance bindings and
//!   explicit implementation bindings from the [`Builder`] live here.
//! * If the key denotes a collection or array, every implementation
//!   advertised for the element type, constructed in discovery order.
//! * The singular plugin advertised for the type.
//! * A default-fallback binding registered with [`Builder::bind_default`].
//! * An auto-factory contract: a factory handle whose every method call
//!   resolves against a fresh child resolver seeded with the call's
//!   arguments.
//! * The type's own registered constructors, if it is concrete — overriding
//!   a plugin or default choice.
//! * The parent resolver, if this is a scoped resolver.
//! * Otherwise resolution fails, naming the requested key.
//!
//! Constructor parameters are further dependencies, resolved recursively
//! before the constructor runs. For a given resolver, all `get` calls are
//! idempotent, and all methods are MT-safe.
//!
//! ## Service Lookup Keys
//!
//! ```rust
//! use plugin_injector::Builder;
//!
//! #[derive(Clone)]
//! struct Port(u16);
//!
//! let resolver = Builder::new()
//!     .bind(Port(8080))
//!     .bind_named("admin", Port(9090))
//!     .build();
//!
//! assert_eq!(resolver.get::<Port>().unwrap().0, 8080);
//! assert_eq!(resolver.get_named::<Port>("admin").unwrap().0, 9090);
//! ```

mod builder;
mod error;
mod factory;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod registry;
mod resolver;
mod scope;
mod storage;

pub use builder::*;
pub use error::*;
pub use key::*;
pub use registry::*;
pub use resolver::*;
pub use scope::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Builder, Constructor, Deps, Error, FactoryScope, Impl, Injectable, Key, PluginSource,
        Registry, Resolver, Result,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    trait Greeter: Send + Sync + std::fmt::Debug {
        fn greet(&self) -> String;
    }

    #[derive(Debug)]
    struct EnglishGreeter {
        name: String,
    }

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            format!("Hello, {}!", self.name)
        }
    }

    fn greeter_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_plugin::<Box<dyn Greeter>>(Impl::of::<EnglishGreeter>().with(
            Constructor::new(|deps: &Deps| {
                Ok(Box::new(EnglishGreeter {
                    name: deps.get::<String>()?.as_ref().clone(),
                }) as Box<dyn Greeter>)
            }),
        ));
        registry
    }

    #[test]
    fn resolution_is_idempotent() {
        let resolver = Builder::new()
            .registry(Arc::new(greeter_registry()))
            .bind(String::from("world"))
            .build();

        let first = resolver.get::<Box<dyn Greeter>>().unwrap();
        let second = resolver.get::<Box<dyn Greeter>>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.greet(), "Hello, world!");
    }

    #[test]
    fn unbound_parameter_reports_the_dependency_path() {
        // one advertised Greeter whose constructor needs an unbound String
        let resolver = Builder::new()
            .registry(Arc::new(greeter_registry()))
            .build();

        let err = resolver.get::<Box<dyn Greeter>>().unwrap_err();
        match &err {
            Error::ParameterResolution {
                key,
                target,
                source,
            } => {
                assert!(target.contains("EnglishGreeter"));
                assert!(key.to_string().contains("String"));
                assert!(matches!(**source, Error::NoImplementation { .. }));
            }
            other => panic!("expected ParameterResolution, got {other:?}"),
        }
    }

    #[test]
    fn qualifiers_cache_independently() {
        struct Sequence(u32);

        let counter = Arc::new(AtomicU32::new(0));
        let make_impl = |counter: Arc<AtomicU32>| {
            Impl::of::<Sequence>().with(Constructor::new(move |_| {
                Ok(Sequence(counter.fetch_add(1, Ordering::SeqCst)))
            }))
        };

        let resolver = Builder::new()
            .bind_named_impl::<Sequence>("a", make_impl(counter.clone()))
            .bind_named_impl::<Sequence>("b", make_impl(counter.clone()))
            .build();

        let a = resolver.get_named::<Sequence>("a").unwrap();
        let b = resolver.get_named::<Sequence>("b").unwrap();
        assert_ne!(a.0, b.0);

        // each qualified key memoizes its own value
        assert!(Arc::ptr_eq(&a, &resolver.get_named::<Sequence>("a").unwrap()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    trait Step: Send + Sync + std::fmt::Debug {
        fn label(&self) -> &'static str;
    }

    #[derive(Debug)]
    struct First;
    #[derive(Debug)]
    struct Second;

    impl Step for First {
        fn label(&self) -> &'static str {
            "first"
        }
    }

    impl Step for Second {
        fn label(&self) -> &'static str {
            "second"
        }
    }

    fn step_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_plugin::<Box<dyn Step>>(
            Impl::of::<First>().with(Constructor::new(|_| Ok(Box::new(First) as Box<dyn Step>))),
        );
        registry.register_plugin::<Box<dyn Step>>(
            Impl::of::<Second>().with(Constructor::new(|_| Ok(Box::new(Second) as Box<dyn Step>))),
        );
        registry
    }

    #[test]
    fn collections_follow_discovery_order() {
        let resolver = Builder::new().registry(Arc::new(step_registry())).build();

        let steps = resolver.get_all::<Box<dyn Step>>().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label(), "first");
        assert_eq!(steps[1].label(), "second");

        // the assembled collection is memoized like any other key
        let again = resolver.get_all::<Box<dyn Step>>().unwrap();
        assert!(Arc::ptr_eq(&steps, &again));
    }

    #[test]
    fn arrays_resolve_independently_of_collections() {
        let resolver = Builder::new().registry(Arc::new(step_registry())).build();

        let array = resolver.get_array::<Box<dyn Step>>().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0].label(), "first");
        assert_eq!(array[1].label(), "second");

        let collection = resolver.get_all::<Box<dyn Step>>().unwrap();
        assert_eq!(collection.len(), array.len());
    }

    #[test]
    fn two_advertisements_are_no_singular_match() {
        // two Steps advertised: a plain (non-collection) request finds no
        // singular plugin and the strategy is exhausted
        let resolver = Builder::new().registry(Arc::new(step_registry())).build();
        assert!(matches!(
            resolver.get::<Box<dyn Step>>().unwrap_err(),
            Error::NoImplementation { .. }
        ));
    }

    #[test]
    fn builtins_arrive_only_through_instance_bindings() {
        let mut registry = Registry::new();
        registry.register_builtin::<String>();
        let registry = Arc::new(registry);

        let unbound = Builder::new().registry(registry.clone()).build();
        assert!(matches!(
            unbound.get::<String>().unwrap_err(),
            Error::NothingProvided { .. }
        ));

        let bound = Builder::new()
            .registry(registry)
            .bind(String::from("provided"))
            .build();
        assert_eq!(*bound.get::<String>().unwrap(), "provided");
    }

    #[test]
    fn auto_factory_wins_over_plugin_advertisement() {
        struct Tag {
            via: &'static str,
        }

        let mut registry = Registry::new();
        registry
            .register_plugin::<Tag>(Impl::of::<Tag>().with(Constructor::new(|_| {
                Ok(Tag { via: "plugin" })
            })));
        registry.register_auto_factory(|_| Tag { via: "factory" });

        let resolver = Builder::new().registry(Arc::new(registry)).build();
        assert_eq!(resolver.get::<Tag>().unwrap().via, "factory");
    }

    /// Discovery backend whose advertisements can change between calls,
    /// standing in for a rescanning plugin finder
    #[derive(Default)]
    struct SwappableDiscovery {
        advertised: Mutex<Vec<Impl>>,
    }

    impl PluginSource for SwappableDiscovery {
        fn find_plugin(&self, _ty: &TypeInfo) -> Option<Impl> {
            let advertised = self.advertised.lock().unwrap();
            match advertised.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            }
        }

        fn find_plugins(&self, _ty: &TypeInfo) -> Vec<Impl> {
            self.advertised.lock().unwrap().clone()
        }
    }

    #[test]
    fn failed_resolution_reruns_the_full_strategy() {
        #[derive(Debug)]
        struct Door;

        let discovery = Arc::new(SwappableDiscovery::default());
        let resolver = Builder::new()
            .plugin_source(discovery.clone())
            .build();

        assert!(matches!(
            resolver.get::<Door>().unwrap_err(),
            Error::NoImplementation { .. }
        ));

        discovery
            .advertised
            .lock()
            .unwrap()
            .push(Impl::of::<Door>().with(Constructor::new(|_| Ok(Door))));

        // the failure was not cached; the strategy runs again and succeeds
        assert!(resolver.get::<Door>().is_ok());
    }

    #[test]
    fn missing_binding_can_be_supplied_in_a_scope_after_failure() {
        let resolver = Builder::new()
            .registry(Arc::new(greeter_registry()))
            .build();

        // first attempt fails on the unbound String parameter
        assert!(resolver.get::<Box<dyn Greeter>>().is_err());

        // the failure was not cached; a scope carrying the missing binding
        // resolves the same key
        let scoped = resolver.scope().bind(String::from("retry")).build();
        let greeter = scoped.get::<Box<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet(), "Hello, retry!");

        // and the enclosing resolver still fails, bindings unchanged
        assert!(resolver.get::<Box<dyn Greeter>>().is_err());
    }

    #[test]
    fn concurrent_resolution_constructs_once() {
        struct Heavy;

        let built = Arc::new(AtomicU32::new(0));
        let counter = built.clone();

        let mut registry = Registry::new();
        registry.register(Impl::of::<Heavy>().with(Constructor::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Heavy)
        })));

        let resolver = Builder::new().registry(Arc::new(registry)).build();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.get::<Heavy>().unwrap())
            })
            .collect();

        let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        for value in &values[1..] {
            assert!(Arc::ptr_eq(&values[0], value));
        }
    }

    #[test]
    fn factory_calls_see_enclosing_bindings_and_stay_independent() {
        struct Connection {
            url: Arc<String>,
            attempt: Arc<u32>,
        }

        struct ConnectionFactory {
            resolver: Resolver,
        }

        impl ConnectionFactory {
            fn connect(&self, attempt: u32) -> Result<Arc<Connection>> {
                self.resolver
                    .factory_scope()
                    .arg(attempt)
                    .create::<Connection>()
            }
        }

        let mut registry = Registry::new();
        registry.register(Impl::of::<Connection>().with(Constructor::new(|deps: &Deps| {
            Ok(Connection {
                url: deps.get::<String>()?,
                attempt: deps.get::<u32>()?,
            })
        })));
        registry.register_auto_factory(|resolver| ConnectionFactory { resolver });

        let resolver = Builder::new()
            .registry(Arc::new(registry))
            .bind(String::from("db://primary"))
            .build();

        let factory = resolver.get::<ConnectionFactory>().unwrap();
        let one = factory.connect(1).unwrap();
        let two = factory.connect(2).unwrap();

        // argument-derived dependencies differ per call
        assert_eq!(*one.attempt, 1);
        assert_eq!(*two.attempt, 2);

        // both calls see the enclosing resolver's bindings, and share its
        // memoized String
        assert!(Arc::ptr_eq(&one.url, &two.url));
        assert_eq!(*one.url, "db://primary");
    }
}
